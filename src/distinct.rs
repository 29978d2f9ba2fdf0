// src/distinct.rs

use serde::Serialize;
use std::collections::BTreeSet;

use crate::record::DeviceRecord;
use crate::schema::Column;

/// Sorted, de-duplicated, non-empty trimmed values of `column`.
pub fn distinct_values(records: &[DeviceRecord], column: Column) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get(column).trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted approval years. Records whose date does not parse are left out of
/// the list but stay in the record set.
pub fn distinct_years(records: &[DeviceRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(DeviceRecord::year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Everything the record explorer offers as filter choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub medical_specialties: Vec<String>,
    pub device_types: Vec<String>,
    pub domains: Vec<String>,
    pub modalities: Vec<String>,
    pub tasks: Vec<String>,
    pub validation_methods: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[DeviceRecord]) -> Self {
        Self {
            years: distinct_years(records),
            medical_specialties: distinct_values(records, Column::MedicalSpecialty),
            device_types: distinct_values(records, Column::DeviceType),
            domains: distinct_values(records, Column::Domain),
            modalities: distinct_values(records, Column::Modality),
            tasks: distinct_values(records, Column::Task),
            validation_methods: distinct_values(records, Column::ValidationMethodAi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: &str, specialty: &str) -> DeviceRecord {
        DeviceRecord {
            date_of_authorization: date.to_string(),
            medical_specialty: specialty.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn values_are_sorted_unique_and_non_empty() {
        let records = vec![
            rec("", "Radiology"),
            rec("", ""),
            rec("", "Cardiology"),
            rec("", "Radiology"),
            rec("", "  "),
        ];
        assert_eq!(
            distinct_values(&records, Column::MedicalSpecialty),
            vec!["Cardiology", "Radiology"]
        );
    }

    #[test]
    fn years_skip_unparseable_dates() {
        let records = vec![
            rec("2021-02-01", ""),
            rec("garbage", ""),
            rec("2019-07-09", ""),
            rec("2021-12-31", ""),
        ];
        assert_eq!(distinct_years(&records), vec!["2019", "2021"]);
    }

    #[test]
    fn filter_options_cover_every_list() {
        let mut r = rec("2020-01-01", "Neurology");
        r.domain = "Neuro (N-1)".into();
        r.validation_method_ai = "Retrospective".into();
        let opts = FilterOptions::from_records(&[r, DeviceRecord::default()]);
        assert_eq!(opts.years, vec!["2020"]);
        assert_eq!(opts.medical_specialties, vec!["Neurology"]);
        assert_eq!(opts.domains, vec!["Neuro (N-1)"]);
        assert_eq!(opts.validation_methods, vec!["Retrospective"]);
        assert!(opts.tasks.is_empty());
    }
}
