// src/dataset.rs

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::aggregate::{process_dimension, CategoryField, ProcessedData};
use crate::distinct::FilterOptions;
use crate::error::{ParseError, PipelineError};
use crate::fetch;
use crate::process::parse_csv_bytes;
use crate::record::{DeviceRecord, MappedRecords, RecordMapper, RejectionTally};
use crate::schema::LayoutDeviation;

/// One fetch of the detailed database, parsed and mapped. Read-only once
/// built; every view aggregates from the same value.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<DeviceRecord>,
    pub rows_seen: usize,
    pub rejections: RejectionTally,
    pub deviations: Vec<LayoutDeviation>,
}

impl Dataset {
    /// Parse and map raw CSV text. `min_columns` of 0 means "whatever the
    /// resolved layout needs".
    pub fn from_csv_text(
        source: impl Into<String>,
        text: &str,
        min_columns: usize,
    ) -> Result<Self, ParseError> {
        Self::from_csv_bytes(source, text.as_bytes(), min_columns)
    }

    /// Same as [`Dataset::from_csv_text`] for an undecoded body. Invalid
    /// UTF-8 is a [`ParseError`].
    pub fn from_csv_bytes(
        source: impl Into<String>,
        body: &[u8],
        min_columns: usize,
    ) -> Result<Self, ParseError> {
        let table = parse_csv_bytes(body)?;
        let mapper = RecordMapper::for_table(&table).with_min_columns(min_columns);
        let MappedRecords {
            records,
            rejections,
            layout,
            rows_seen,
        } = mapper.map(&table.rows);

        Ok(Self {
            source: source.into(),
            fetched_at: Utc::now(),
            records,
            rows_seen,
            rejections,
            deviations: layout.deviations().to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn drop_ratio(&self) -> f64 {
        self.rejections.share_of(self.rows_seen)
    }

    /// Aggregate a single dimension.
    pub fn process(&self, field: CategoryField) -> ProcessedData {
        process_dimension(&self.records, field)
    }

    /// Aggregate every dimension in parallel. No coordination is needed
    /// because nothing here mutates the dataset.
    pub fn process_all(&self) -> BTreeMap<CategoryField, ProcessedData> {
        CategoryField::ALL
            .par_iter()
            .map(|&field| (field, self.process(field)))
            .collect()
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_records(&self.records)
    }

    pub fn summary(&self) -> DetailedSummary {
        let options = self.filter_options();
        DetailedSummary {
            source: self.source.clone(),
            fetched_at: self.fetched_at,
            total_records: self.records.len(),
            rows_seen: self.rows_seen,
            rejections: self.rejections.clone(),
            deviations: self.deviations.clone(),
            options,
        }
    }
}

/// Headline numbers for the detailed view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedSummary {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub total_records: usize,
    pub rows_seen: usize,
    pub rejections: RejectionTally,
    pub deviations: Vec<LayoutDeviation>,
    #[serde(flatten)]
    pub options: FilterOptions,
}

/// Fetch, parse and map the detailed database once for a refresh cycle.
#[instrument(level = "info", skip(client))]
pub async fn load_dataset(
    client: &Client,
    url: &str,
    min_columns: usize,
) -> Result<Arc<Dataset>, PipelineError> {
    let body = fetch::fetch_csv_body(client, url).await?;

    // parsing is CPU-bound; keep it off the async workers
    let source = url.to_string();
    let dataset = tokio::task::spawn_blocking(move || {
        Dataset::from_csv_bytes(source, &body, min_columns)
    })
    .await??;

    if !dataset.deviations.is_empty() {
        warn!(
            deviations = dataset.deviations.len(),
            "source layout differs from the expected schema"
        );
    }
    info!(
        records = dataset.len(),
        rows = dataset.rows_seen,
        dropped = dataset.rejections.total(),
        "dataset ready"
    );
    Ok(Arc::new(dataset))
}
