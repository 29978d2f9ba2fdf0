// src/stats.rs

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::{ProcessedData, View};
use crate::distinct::distinct_values;
use crate::process::date_parser::{parse_date, parse_year_num};
use crate::process::split_code_suffix;
use crate::record::DeviceRecord;
use crate::schema::Column;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    /// Full stored value, code suffix included.
    pub name: String,
    /// Parenthetical code, e.g. `COVI-1` for `Cardiology (COVI-1)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub count: u64,
}

impl Count {
    fn new(name: impl Into<String>, count: u64) -> Self {
        let name = name.into();
        let code = split_code_suffix(&name).1.map(str::to_string);
        Self { name, code, count }
    }

    /// Display label with any code suffix removed.
    pub fn label(&self) -> &str {
        split_code_suffix(&self.name).0
    }
}

/// Headline figures for one dimension and view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixStats {
    pub view: View,
    /// Sum over categories per year, in axis order.
    pub year_totals: Vec<Count>,
    /// Devices per category (annual counts summed), largest first.
    pub category_totals: Vec<Count>,
    /// Last year's total minus the first year's.
    pub total_growth: i64,
    /// `total_growth` relative to the first year; `None` when that is zero.
    pub growth_percent: Option<f64>,
    pub peak_year: Option<Count>,
    pub average_per_year: u64,
}

impl MatrixStats {
    pub fn compute(data: &ProcessedData, view: View) -> Self {
        let matrix = data.matrix(view);

        let year_totals: Vec<Count> = data
            .years
            .iter()
            .map(|y| Count::new(y.as_str(), matrix.year_total(y)))
            .collect();

        let mut category_totals: Vec<Count> = data
            .categories
            .iter()
            .map(|c| Count::new(c.as_str(), data.annual.category_total(c)))
            .collect();
        // stable: ties keep alphabetical order
        category_totals.sort_by(|a, b| b.count.cmp(&a.count));

        let first = year_totals.first().map_or(0, |c| c.count);
        let last = year_totals.last().map_or(0, |c| c.count);
        let total_growth = last as i64 - first as i64;
        let growth_percent =
            (first > 0).then(|| (total_growth as f64 / first as f64 * 1000.0).round() / 10.0);

        let peak_year = year_totals
            .iter()
            .fold(None::<&Count>, |best, c| match best {
                Some(b) if b.count >= c.count => Some(b),
                _ => Some(c),
            })
            .cloned();

        let sum = year_totals
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.count));
        let average_per_year = if year_totals.is_empty() {
            0
        } else {
            (sum as f64 / year_totals.len() as f64).round() as u64
        };

        Self {
            view,
            year_totals,
            category_totals,
            total_growth,
            growth_percent,
            peak_year,
            average_per_year,
        }
    }

    pub fn top(&self, n: usize) -> &[Count] {
        &self.category_totals[..n.min(self.category_totals.len())]
    }
}

/// The `n` most frequent non-empty values of `column`, largest first.
pub fn top_categories(records: &[DeviceRecord], column: Column, n: usize) -> Vec<Count> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for r in records {
        let v = r.get(column);
        if !v.is_empty() {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    let mut out: Vec<Count> = counts
        .into_iter()
        .map(|(name, count)| Count::new(name, count))
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(n);
    out
}

/// Approvals per year across all categories, ascending by year.
pub fn yearly_counts(records: &[DeviceRecord]) -> Vec<Count> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for year in records.iter().filter_map(DeviceRecord::year) {
        *counts.entry(year).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(year, count)| Count::new(year, count))
        .collect()
}

/// Days counted as "recent" in [`OverviewStats`].
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Headline panel: this year against last year, plus recent approvals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_devices: usize,
    pub current_year: i32,
    pub current_year_devices: usize,
    pub previous_year_devices: usize,
    /// Year-over-year change in percent, one decimal. `None` when the
    /// previous year has no approvals.
    pub year_over_year_percent: Option<f64>,
    /// Authorized on or after `today` minus [`RECENT_WINDOW_DAYS`].
    pub recent_devices: usize,
    pub medical_specialties: usize,
}

impl OverviewStats {
    pub fn compute(records: &[DeviceRecord], today: NaiveDate) -> Self {
        let current_year = today.year();
        let cutoff = today - Duration::days(RECENT_WINDOW_DAYS);

        let mut current_year_devices = 0;
        let mut previous_year_devices = 0;
        let mut recent_devices = 0;
        for r in records {
            match parse_year_num(&r.date_of_authorization) {
                Some(y) if y == current_year => current_year_devices += 1,
                Some(y) if y == current_year - 1 => previous_year_devices += 1,
                _ => {}
            }
            // bare years carry no day, so they never count as recent
            if parse_date(&r.date_of_authorization).map_or(false, |d| d >= cutoff) {
                recent_devices += 1;
            }
        }

        let year_over_year_percent = (previous_year_devices > 0).then(|| {
            let change = current_year_devices as f64 - previous_year_devices as f64;
            (change / previous_year_devices as f64 * 1000.0).round() / 10.0
        });

        Self {
            total_devices: records.len(),
            current_year,
            current_year_devices,
            previous_year_devices,
            year_over_year_percent,
            recent_devices,
            medical_specialties: distinct_values(records, Column::MedicalSpecialty).len(),
        }
    }
}
