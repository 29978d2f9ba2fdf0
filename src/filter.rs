// src/filter.rs

use std::cmp::Ordering;

use crate::aggregate::{ProcessedData, View};
use crate::record::DeviceRecord;

/// Record explorer filters. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive substring over device name, developer and submission number.
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub year: Option<String>,
    pub domain: Option<String>,
    pub task: Option<String>,
    pub modality: Option<String>,
}

fn exact(want: &Option<String>, have: &str) -> bool {
    want.as_deref().map_or(true, |w| w == have)
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &DeviceRecord) -> bool {
        if let Some(term) = self.search.as_deref().map(str::to_lowercase) {
            let hit = [
                &record.device_name,
                &record.device_developer,
                &record.submission_number,
            ]
            .iter()
            .any(|f| f.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if let Some(year) = &self.year {
            if record.year().as_ref() != Some(year) {
                return false;
            }
        }

        exact(&self.specialty, &record.medical_specialty)
            && exact(&self.domain, &record.domain)
            && exact(&self.task, &record.task)
            && exact(&self.modality, &record.modality)
    }

    pub fn apply<'a>(&self, records: &'a [DeviceRecord]) -> Vec<&'a DeviceRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Category,
    Total,
    Year(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Category table filters over one view of a dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    /// Case-insensitive substring over the category name.
    pub search: Option<String>,
    /// Inclusive bounds on the category's total.
    pub min_total: Option<u64>,
    pub max_total: Option<u64>,
    pub sort: Option<(SortKey, SortDirection)>,
}

/// Row total: the sum of annual counts, which is also the last cumulative
/// value.
pub fn category_total(data: &ProcessedData, category: &str) -> u64 {
    data.annual.category_total(category)
}

impl CategoryFilter {
    pub fn apply(&self, data: &ProcessedData, view: View) -> Vec<String> {
        let term = self.search.as_deref().map(str::to_lowercase);
        let matrix = data.matrix(view);

        let mut out: Vec<String> = data
            .categories
            .iter()
            .filter(|c| term.as_ref().map_or(true, |t| c.to_lowercase().contains(t)))
            .filter(|c| {
                let total = category_total(data, c);
                self.min_total.map_or(true, |m| total >= m)
                    && self.max_total.map_or(true, |m| total <= m)
            })
            .cloned()
            .collect();

        if let Some((key, dir)) = &self.sort {
            out.sort_by(|a, b| {
                let ord = match key {
                    SortKey::Category => a.cmp(b),
                    SortKey::Total => category_total(data, a).cmp(&category_total(data, b)),
                    SortKey::Year(y) => matrix.get(a, y).cmp(&matrix.get(b, y)),
                };
                let ord = match dir {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                // ties fall back to name order
                ord.then_with(|| match key {
                    SortKey::Category => Ordering::Equal,
                    _ => a.cmp(b),
                })
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{process_dimension, CategoryField};

    fn rec(name: &str, dev: &str, date: &str, domain: &str) -> DeviceRecord {
        DeviceRecord {
            submission_number: format!("K{}", name.len()),
            device_name: name.to_string(),
            device_developer: dev.to_string(),
            date_of_authorization: date.to_string(),
            domain: domain.to_string(),
            medical_specialty: "Radiology".to_string(),
            ..Default::default()
        }
    }

    fn records() -> Vec<DeviceRecord> {
        vec![
            rec("LungScan", "Acme", "2020-01-01", "Chest"),
            rec("BrainView", "NeuroCo", "2021-01-01", "Neuro"),
            rec("ChestAI", "Acme", "2021-06-01", "Chest"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let f = RecordFilter::default();
        assert!(f.is_empty());
        assert_eq!(f.apply(&records()).len(), 3);
    }

    #[test]
    fn search_is_case_insensitive_over_name_developer_and_submission() {
        let recs = records();
        let f = RecordFilter {
            search: Some("acme".into()),
            ..Default::default()
        };
        assert_eq!(f.apply(&recs).len(), 2);

        let f = RecordFilter {
            search: Some("brainview".into()),
            ..Default::default()
        };
        assert_eq!(f.apply(&recs)[0].device_developer, "NeuroCo");

        let f = RecordFilter {
            search: Some("k8".into()),
            ..Default::default()
        };
        assert_eq!(f.apply(&recs).len(), 1);
    }

    #[test]
    fn exact_filters_combine() {
        let recs = records();
        let f = RecordFilter {
            year: Some("2021".into()),
            domain: Some("Chest".into()),
            specialty: Some("Radiology".into()),
            ..Default::default()
        };
        let hits = f.apply(&recs);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].device_name, "ChestAI");

        let f = RecordFilter {
            domain: Some("chest".into()),
            ..Default::default()
        };
        assert!(f.apply(&recs).is_empty());
    }

    #[test]
    fn category_filter_bounds_and_sorts() {
        let data = process_dimension(&records(), CategoryField::Domain);

        let f = CategoryFilter {
            min_total: Some(2),
            ..Default::default()
        };
        assert_eq!(f.apply(&data, View::Annual), vec!["Chest"]);

        let f = CategoryFilter {
            search: Some("EUR".into()),
            ..Default::default()
        };
        assert_eq!(f.apply(&data, View::Annual), vec!["Neuro"]);

        let f = CategoryFilter {
            sort: Some((SortKey::Total, SortDirection::Asc)),
            ..Default::default()
        };
        assert_eq!(f.apply(&data, View::Annual), vec!["Neuro", "Chest"]);

        let f = CategoryFilter {
            sort: Some((SortKey::Category, SortDirection::Desc)),
            ..Default::default()
        };
        assert_eq!(f.apply(&data, View::Annual), vec!["Neuro", "Chest"]);

        let f = CategoryFilter {
            sort: Some((SortKey::Year("2020".into()), SortDirection::Desc)),
            ..Default::default()
        };
        assert_eq!(f.apply(&data, View::Cumulative), vec!["Chest", "Neuro"]);
    }
}
