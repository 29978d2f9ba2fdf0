// src/aggregate.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::record::{DeviceRecord, RejectReason, RejectionTally};
use crate::schema::Column;

/// A field whose distinct values become chart categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryField {
    DeviceType,
    Domain,
    Modality,
    Task,
    MedicalSpecialty,
}

impl CategoryField {
    pub const ALL: [CategoryField; 5] = [
        CategoryField::DeviceType,
        CategoryField::Domain,
        CategoryField::Modality,
        CategoryField::Task,
        CategoryField::MedicalSpecialty,
    ];

    pub fn column(self) -> Column {
        match self {
            CategoryField::DeviceType => Column::DeviceType,
            CategoryField::Domain => Column::Domain,
            CategoryField::Modality => Column::Modality,
            CategoryField::Task => Column::Task,
            CategoryField::MedicalSpecialty => Column::MedicalSpecialty,
        }
    }

    /// Short name used on the command line and in export file names.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryField::DeviceType => "device-type",
            CategoryField::Domain => "domain",
            CategoryField::Modality => "modality",
            CategoryField::Task => "task",
            CategoryField::MedicalSpecialty => "specialty",
        }
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "devicetype" | "type" => Ok(CategoryField::DeviceType),
            "domain" => Ok(CategoryField::Domain),
            "modality" => Ok(CategoryField::Modality),
            "task" => Ok(CategoryField::Task),
            "specialty" | "medicalspecialty" => Ok(CategoryField::MedicalSpecialty),
            _ => Err(format!(
                "unknown category field {:?} (expected device-type, domain, modality, task or specialty)",
                s
            )),
        }
    }
}

/// category → year → count. Missing pairs read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountMatrix(BTreeMap<String, BTreeMap<String, u64>>);

fn saturating_sum<'a>(values: impl Iterator<Item = &'a u64>) -> u64 {
    values.fold(0u64, |acc, n| acc.saturating_add(*n))
}

impl CountMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, category: &str, year: &str) {
        self.add(category, year, 1);
    }

    /// Add `n` to a cell. Saturates at `u64::MAX`.
    pub fn add(&mut self, category: &str, year: &str, n: u64) {
        let cell = self
            .0
            .entry(category.to_string())
            .or_default()
            .entry(year.to_string())
            .or_insert(0);
        *cell = cell.saturating_add(n);
    }

    pub fn set(&mut self, category: &str, year: &str, n: u64) {
        self.0
            .entry(category.to_string())
            .or_default()
            .insert(year.to_string(), n);
    }

    pub fn get(&self, category: &str, year: &str) -> u64 {
        self.0
            .get(category)
            .and_then(|years| years.get(year))
            .copied()
            .unwrap_or(0)
    }

    pub fn row(&self, category: &str) -> Option<&BTreeMap<String, u64>> {
        self.0.get(category)
    }

    /// Sum over every year of `category`.
    pub fn category_total(&self, category: &str) -> u64 {
        self.0
            .get(category)
            .map(|years| saturating_sum(years.values()))
            .unwrap_or(0)
    }

    /// Sum over every category for `year`.
    pub fn year_total(&self, year: &str) -> u64 {
        saturating_sum(self.0.values().filter_map(|years| years.get(year)))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every year present in any row, ascending.
    pub fn years(&self) -> Vec<String> {
        self.0
            .values()
            .flat_map(|years| years.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn max_value(&self) -> u64 {
        self.0
            .values()
            .flat_map(|years| years.values().copied())
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the rows for `categories` only.
    pub fn select(&self, categories: &[String]) -> Self {
        Self(
            categories
                .iter()
                .filter_map(|c| self.0.get(c).map(|row| (c.clone(), row.clone())))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, u64>)> {
        self.0.iter()
    }
}

/// Annual counts for one dimension plus what was left out of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub annual: CountMatrix,
    pub categories: Vec<String>,
    pub years: Vec<String>,
    pub skipped: RejectionTally,
}

/// Count records per (category value, approval year).
///
/// Records with a blank category or an unparseable date are skipped from
/// this pass only. The year axis is exactly the observed years.
pub fn aggregate_annual(records: &[DeviceRecord], field: CategoryField) -> Aggregation {
    let mut annual = CountMatrix::new();
    let mut years = BTreeSet::new();
    let mut skipped = RejectionTally::default();

    for record in records {
        let category = record.get(field.column());
        if category.is_empty() {
            skipped.record(RejectReason::MissingCategory);
            continue;
        }
        let Some(year) = record.year() else {
            skipped.record(RejectReason::UnparseableDate);
            continue;
        };
        annual.increment(category, &year);
        years.insert(year);
    }

    let categories: Vec<String> = annual.categories().map(str::to_string).collect();
    debug!(
        %field,
        categories = categories.len(),
        years = years.len(),
        skipped = skipped.total(),
        "aggregated annual counts"
    );

    Aggregation {
        annual,
        categories,
        years: years.into_iter().collect(),
        skipped,
    }
}

/// Running totals per category over the shared year axis.
///
/// Every category gets an entry for every year on the axis. The axis is
/// walked in ascending order whatever order it is passed in.
pub fn cumulative(annual: &CountMatrix, years: &[String]) -> CountMatrix {
    let mut axis: Vec<&String> = years.iter().collect();
    axis.sort();
    axis.dedup();

    let mut out = CountMatrix::new();
    for (category, _) in annual.iter() {
        let mut running = 0u64;
        for year in &axis {
            running = running.saturating_add(annual.get(category, year));
            out.set(category, year, running);
        }
    }
    out
}

/// Chart-ready data for one categorical dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedData {
    pub annual: CountMatrix,
    pub cumulative: CountMatrix,
    pub categories: Vec<String>,
    pub years: Vec<String>,
    #[serde(skip_serializing_if = "RejectionTally::is_empty")]
    pub skipped: RejectionTally,
}

impl ProcessedData {
    /// Build from an annual matrix whose axes are read off the matrix itself.
    pub fn from_annual(annual: CountMatrix) -> Self {
        let years = annual.years();
        let categories = annual.categories().map(str::to_string).collect();
        let cumulative = cumulative(&annual, &years);
        Self {
            annual,
            cumulative,
            categories,
            years,
            skipped: RejectionTally::default(),
        }
    }

    /// Narrow both matrices and the category list to `categories`, kept in
    /// the given order. The year axis is unchanged.
    pub fn select(&self, categories: &[String]) -> Self {
        Self {
            annual: self.annual.select(categories),
            cumulative: self.cumulative.select(categories),
            categories: categories
                .iter()
                .filter(|c| self.categories.contains(c))
                .cloned()
                .collect(),
            years: self.years.clone(),
            skipped: self.skipped.clone(),
        }
    }

    pub fn matrix(&self, view: View) -> &CountMatrix {
        match view {
            View::Annual => &self.annual,
            View::Cumulative => &self.cumulative,
        }
    }
}

/// Which matrix a table, chart or export reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Annual,
    Cumulative,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Annual => "annual",
            View::Cumulative => "cumulative",
        }
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "annual" => Ok(View::Annual),
            "cumulative" => Ok(View::Cumulative),
            _ => Err(format!("unknown view {:?} (expected annual or cumulative)", s)),
        }
    }
}

/// Aggregate one dimension end to end.
pub fn process_dimension(records: &[DeviceRecord], field: CategoryField) -> ProcessedData {
    let Aggregation {
        annual,
        categories,
        years,
        skipped,
    } = aggregate_annual(records, field);
    let cumulative = cumulative(&annual, &years);
    ProcessedData {
        annual,
        cumulative,
        categories,
        years,
        skipped,
    }
}
