// src/record.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::process::{parse_year, RawTable};
use crate::schema::{Column, ColumnLayout};

/// One approved device submission. Every field is a trimmed string; absent
/// cells are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub submission_number: String,
    pub date_of_authorization: String,
    pub device_name: String,
    pub device_developer: String,
    #[serde(rename = "validationMethodAI")]
    pub validation_method_ai: String,
    #[serde(rename = "aiValidationJustification")]
    pub ai_validation_justification: String,
    pub validation_method_human: String,
    #[serde(rename = "rctAI")]
    pub rct_ai: String,
    pub rct_human: String,
    pub medical_specialty: String,
    pub device_classification: String,
    pub device_type: String,
    #[serde(rename = "deviceTypeFDAGroup")]
    pub device_type_fda_group: String,
    pub device_type_category: String,
    pub domain: String,
    pub domain_code: String,
    pub modality: String,
    pub modality_code: String,
    pub task: String,
    pub task_code: String,
    pub device_function: String,
    pub key_cues: String,
}

impl DeviceRecord {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::SubmissionNumber => &self.submission_number,
            Column::DateOfAuthorization => &self.date_of_authorization,
            Column::DeviceName => &self.device_name,
            Column::DeviceDeveloper => &self.device_developer,
            Column::ValidationMethodAi => &self.validation_method_ai,
            Column::AiValidationJustification => &self.ai_validation_justification,
            Column::ValidationMethodHuman => &self.validation_method_human,
            Column::RctAi => &self.rct_ai,
            Column::RctHuman => &self.rct_human,
            Column::MedicalSpecialty => &self.medical_specialty,
            Column::DeviceClassification => &self.device_classification,
            Column::DeviceType => &self.device_type,
            Column::DeviceTypeFdaGroup => &self.device_type_fda_group,
            Column::DeviceTypeCategory => &self.device_type_category,
            Column::Domain => &self.domain,
            Column::DomainCode => &self.domain_code,
            Column::Modality => &self.modality,
            Column::ModalityCode => &self.modality_code,
            Column::Task => &self.task,
            Column::TaskCode => &self.task_code,
            Column::DeviceFunction => &self.device_function,
            Column::KeyCues => &self.key_cues,
        }
    }

    /// Year of authorization, if the date parses.
    pub fn year(&self) -> Option<String> {
        parse_year(&self.date_of_authorization)
    }

    fn from_row(row: &[String], layout: &ColumnLayout) -> Self {
        let cell = |c| layout.cell(row, c);
        Self {
            submission_number: cell(Column::SubmissionNumber),
            date_of_authorization: cell(Column::DateOfAuthorization),
            device_name: cell(Column::DeviceName),
            device_developer: cell(Column::DeviceDeveloper),
            validation_method_ai: cell(Column::ValidationMethodAi),
            ai_validation_justification: cell(Column::AiValidationJustification),
            validation_method_human: cell(Column::ValidationMethodHuman),
            rct_ai: cell(Column::RctAi),
            rct_human: cell(Column::RctHuman),
            medical_specialty: cell(Column::MedicalSpecialty),
            device_classification: cell(Column::DeviceClassification),
            device_type: cell(Column::DeviceType),
            device_type_fda_group: cell(Column::DeviceTypeFdaGroup),
            device_type_category: cell(Column::DeviceTypeCategory),
            domain: cell(Column::Domain),
            domain_code: cell(Column::DomainCode),
            modality: cell(Column::Modality),
            modality_code: cell(Column::ModalityCode),
            task: cell(Column::Task),
            task_code: cell(Column::TaskCode),
            device_function: cell(Column::DeviceFunction),
            key_cues: cell(Column::KeyCues),
        }
    }
}

/// Why a row or record was left out of a pass. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Row had fewer fields than the layout needs.
    TooFewColumns,
    /// Categorical value blank.
    MissingCategory,
    /// Date of authorization blank or not a calendar date.
    UnparseableDate,
}

/// Discard counts by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RejectionTally {
    counts: BTreeMap<RejectReason, usize>,
}

impl RejectionTally {
    pub fn record(&mut self, reason: RejectReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn count(&self, reason: RejectReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Share of `rows` that was dropped, 0.0..=1.0.
    pub fn share_of(&self, rows: usize) -> f64 {
        if rows == 0 {
            0.0
        } else {
            self.total() as f64 / rows as f64
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RejectReason, usize)> + '_ {
        self.counts.iter().map(|(r, n)| (*r, *n))
    }
}

/// Output of a mapping pass.
#[derive(Debug, Clone)]
pub struct MappedRecords {
    pub records: Vec<DeviceRecord>,
    pub rejections: RejectionTally,
    pub layout: ColumnLayout,
    /// Data rows seen, header excluded.
    pub rows_seen: usize,
}

impl MappedRecords {
    /// Share of data rows that were dropped, 0.0..=1.0.
    pub fn drop_ratio(&self) -> f64 {
        self.rejections.share_of(self.rows_seen)
    }
}

/// Maps parsed rows to [`DeviceRecord`]s through a resolved layout.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    layout: ColumnLayout,
    min_columns: usize,
}

impl RecordMapper {
    pub fn new(layout: ColumnLayout) -> Self {
        let min_columns = layout.required_width();
        Self {
            layout,
            min_columns,
        }
    }

    /// Build a mapper for `table`, resolving its header row.
    pub fn for_table(table: &RawTable) -> Self {
        Self::new(ColumnLayout::resolve(&table.headers))
    }

    /// Raise the minimum field count. It never drops below what the layout needs.
    pub fn with_min_columns(mut self, min_columns: usize) -> Self {
        self.min_columns = min_columns.max(self.layout.required_width());
        self
    }

    pub fn min_columns(&self) -> usize {
        self.min_columns
    }

    #[instrument(level = "debug", skip_all, fields(rows = rows.len()))]
    pub fn map(&self, rows: &[Vec<String>]) -> MappedRecords {
        let mut records = Vec::with_capacity(rows.len());
        let mut rejections = RejectionTally::default();

        for (idx, row) in rows.iter().enumerate() {
            if row.len() < self.min_columns {
                debug!(
                    row = idx + 1,
                    fields = row.len(),
                    required = self.min_columns,
                    "skipping short row"
                );
                rejections.record(RejectReason::TooFewColumns);
                continue;
            }
            records.push(DeviceRecord::from_row(row, &self.layout));
        }

        info!(
            admitted = records.len(),
            rejected = rejections.total(),
            "mapped device records"
        );

        MappedRecords {
            records,
            rejections,
            layout: self.layout.clone(),
            rows_seen: rows.len(),
        }
    }
}

/// Resolve `table`'s header and map every data row.
pub fn map_records(table: &RawTable) -> MappedRecords {
    RecordMapper::for_table(table).map(&table.rows)
}
