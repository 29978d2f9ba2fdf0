// src/legacy.rs
//
// Older four-sheet source: one published sheet per dimension, already
// pivoted by year. Header = category label then one column per year; each
// data row = category name then per-year counts.

use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::aggregate::{cumulative, CategoryField, CountMatrix, ProcessedData};
use crate::error::{ParseError, PipelineError};
use crate::fetch;
use crate::process::{parse_csv, parse_csv_bytes, RawTable};
use crate::record::{RejectReason, RejectionTally};

/// Column offsets of a summary sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLayout {
    pub category_col: usize,
    pub first_year_col: usize,
}

impl Default for SummaryLayout {
    fn default() -> Self {
        Self {
            category_col: 0,
            first_year_col: 1,
        }
    }
}

fn is_year_label(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())
}

/// Largest per-cell count accepted from a summary sheet. Anything above is
/// an unreadable cell, not a count.
const MAX_CELL_COUNT: u64 = 1_000_000;

// Summary exports sometimes wrap cells in an extra pair of quotes.
fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.trim().to_string(),
        None => trimmed.to_string(),
    }
}

fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = clean_cell(raw).chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Some(0);
    }
    cleaned
        .parse::<u64>()
        .ok()
        .or_else(|| {
            // sheets sometimes export whole numbers as "3.0"
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .filter(|f| *f <= MAX_CELL_COUNT as f64)
                .map(|f| f as u64)
        })
        .filter(|n| *n <= MAX_CELL_COUNT)
}

/// Parse a pre-pivoted summary table into chart data.
///
/// The year axis is the set of year labels the header declares. Non-year
/// header cells (a trailing "Total", say) are ignored, as are summary rows
/// labelled "Total". Unreadable count cells are tallied and treated as zero.
pub fn parse_summary_table(
    table: &RawTable,
    layout: SummaryLayout,
) -> Result<ProcessedData, ParseError> {
    let year_cols: Vec<(usize, String)> = table
        .headers
        .iter()
        .enumerate()
        .skip(layout.first_year_col)
        .map(|(i, h)| (i, clean_cell(h)))
        .filter(|(_, h)| is_year_label(h))
        .collect();

    if year_cols.is_empty() {
        return Err(ParseError::Malformed {
            line: 1,
            message: format!(
                "no year labels in summary header from column {}",
                layout.first_year_col
            ),
        });
    }

    let mut annual = CountMatrix::new();
    let mut categories = BTreeSet::new();
    let mut skipped = RejectionTally::default();
    let mut bad_cells = 0usize;

    for row in &table.rows {
        let category = row
            .get(layout.category_col)
            .map(|c| clean_cell(c))
            .unwrap_or_default();
        if category.is_empty() {
            skipped.record(RejectReason::MissingCategory);
            continue;
        }
        let lowered = category.to_lowercase();
        if lowered == "total" || lowered == "grand total" {
            continue;
        }
        if row.len() <= layout.first_year_col {
            skipped.record(RejectReason::TooFewColumns);
            continue;
        }

        categories.insert(category.clone());
        for (col, year) in &year_cols {
            match row.get(*col).map(|c| parse_count(c)) {
                Some(Some(0)) | None => {}
                Some(Some(n)) => annual.add(&category, year, n),
                Some(None) => {
                    bad_cells += 1;
                    debug!(%category, %year, cell = ?row.get(*col), "unreadable count");
                }
            }
        }
    }

    if bad_cells > 0 {
        warn!(bad_cells, "summary sheet had non-numeric count cells");
    }

    let years: Vec<String> = year_cols
        .into_iter()
        .map(|(_, y)| y)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let cumulative = cumulative_for(&categories, &annual, &years);

    Ok(ProcessedData {
        annual,
        cumulative,
        categories: categories.into_iter().collect(),
        years,
        skipped,
    })
}

// Categories whose every count is zero still get a cumulative row.
fn cumulative_for(
    categories: &BTreeSet<String>,
    annual: &CountMatrix,
    years: &[String],
) -> CountMatrix {
    let mut out = cumulative(annual, years);
    for category in categories {
        if out.row(category).is_none() {
            for year in years {
                out.set(category, year, 0);
            }
        }
    }
    out
}

/// Parse one summary sheet's CSV text.
pub fn parse_summary_csv(text: &str, layout: SummaryLayout) -> Result<ProcessedData, ParseError> {
    let table = parse_csv(text)?;
    parse_summary_table(&table, layout)
}

/// Fetch every configured summary sheet concurrently and parse each.
pub async fn load_summary_sheets(
    client: &Client,
    sheets: &BTreeMap<CategoryField, String>,
    layout: SummaryLayout,
) -> Result<BTreeMap<CategoryField, ProcessedData>, PipelineError> {
    let fields: Vec<CategoryField> = sheets.keys().copied().collect();
    let urls: Vec<String> = sheets.values().cloned().collect();

    let bodies = fetch::fetch_many(client, &urls).await?;

    let mut out = BTreeMap::new();
    for (field, (url, body)) in fields.into_iter().zip(bodies) {
        let data = parse_summary_table(&parse_csv_bytes(&body)?, layout)?;
        info!(
            %field,
            %url,
            categories = data.categories.len(),
            years = data.years.len(),
            "loaded summary sheet"
        );
        out.insert(field, data);
    }
    Ok(out)
}
