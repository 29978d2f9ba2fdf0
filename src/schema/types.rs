// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// One column of the detailed device database, in canonical source order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    SubmissionNumber,
    DateOfAuthorization,
    DeviceName,
    DeviceDeveloper,
    ValidationMethodAi,
    AiValidationJustification,
    ValidationMethodHuman,
    RctAi,
    RctHuman,
    MedicalSpecialty,
    DeviceClassification,
    DeviceType,
    DeviceTypeFdaGroup,
    DeviceTypeCategory,
    Domain,
    DomainCode,
    Modality,
    ModalityCode,
    Task,
    TaskCode,
    DeviceFunction,
    KeyCues,
}

impl Column {
    pub const COUNT: usize = 22;

    pub const ALL: [Column; Column::COUNT] = [
        Column::SubmissionNumber,
        Column::DateOfAuthorization,
        Column::DeviceName,
        Column::DeviceDeveloper,
        Column::ValidationMethodAi,
        Column::AiValidationJustification,
        Column::ValidationMethodHuman,
        Column::RctAi,
        Column::RctHuman,
        Column::MedicalSpecialty,
        Column::DeviceClassification,
        Column::DeviceType,
        Column::DeviceTypeFdaGroup,
        Column::DeviceTypeCategory,
        Column::Domain,
        Column::DomainCode,
        Column::Modality,
        Column::ModalityCode,
        Column::Task,
        Column::TaskCode,
        Column::DeviceFunction,
        Column::KeyCues,
    ];

    /// Positional offset in the published sheet (columns A..V).
    pub fn position(self) -> usize {
        self as usize
    }

    /// Header text as it appears in the published sheet.
    pub fn header_name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Accepted header spellings; the first is canonical.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::SubmissionNumber => &["Submission Number", "Submission #", "Submission No"],
            Column::DateOfAuthorization => &[
                "Date of Authorization",
                "Date of Final Decision",
                "Decision Date",
                "Date",
            ],
            Column::DeviceName => &["Device Name", "Device"],
            Column::DeviceDeveloper => &["Device Developer", "Developer", "Company"],
            Column::ValidationMethodAi => &["Validation Method (AI)", "AI Validation Method"],
            Column::AiValidationJustification => &["AI Validation Justification"],
            Column::ValidationMethodHuman => {
                &["Validation Method (Human)", "Human Validation Method"]
            }
            Column::RctAi => &["RCT (AI)", "AI RCT"],
            Column::RctHuman => &["RCT (Human)", "Human RCT"],
            Column::MedicalSpecialty => &["Medical Specialty", "Panel (lead)", "Specialty"],
            Column::DeviceClassification => &["Device Classification", "Classification"],
            Column::DeviceType => &["Device Type"],
            Column::DeviceTypeFdaGroup => &["Device Type (FDA Group)", "FDA Group"],
            Column::DeviceTypeCategory => &["Device Type Category"],
            Column::Domain => &["Domain"],
            Column::DomainCode => &["Domain Code"],
            Column::Modality => &["Modality"],
            Column::ModalityCode => &["Modality Code"],
            Column::Task => &["Task"],
            Column::TaskCode => &["Task Code"],
            Column::DeviceFunction => &["Device Function", "Function"],
            Column::KeyCues => &["Key Cues"],
        }
    }
}
