use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use super::Column;

/// How the resolved layout differs from the canonical positional schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutDeviation {
    /// No header cell matched; a free position is read instead.
    Unresolved { column: Column, fallback: usize },
    /// No header cell matched and no free position was left; reads empty.
    Missing { column: Column },
    /// Header found, but not at the canonical offset.
    Moved {
        column: Column,
        expected: usize,
        found: usize,
    },
    /// Nothing in the header row was recognised; the whole layout is positional.
    HeaderUnrecognized,
}

impl fmt::Display for LayoutDeviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDeviation::Unresolved { column, fallback } => write!(
                f,
                "header {:?} not found, using position {}",
                column.header_name(),
                fallback
            ),
            LayoutDeviation::Missing { column } => write!(
                f,
                "header {:?} not found and its position is taken, leaving it empty",
                column.header_name()
            ),
            LayoutDeviation::Moved {
                column,
                expected,
                found,
            } => write!(
                f,
                "header {:?} found at position {} (expected {})",
                column.header_name(),
                found,
                expected
            ),
            LayoutDeviation::HeaderUnrecognized => {
                write!(f, "no known headers found, using positional layout")
            }
        }
    }
}

/// Column → field index, resolved once per fetched table. `None` means the
/// column is absent and always reads empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    indices: [Option<usize>; Column::COUNT],
    deviations: Vec<LayoutDeviation>,
}

fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// The offset every resolved column moved by, if they all agree.
fn common_shift(found: &[Option<usize>; Column::COUNT]) -> Option<isize> {
    let mut shifts = Column::ALL.iter().filter_map(|col| {
        found[col.position()].map(|idx| idx as isize - col.position() as isize)
    });
    let first = shifts.next()?;
    shifts.all(|s| s == first).then_some(first)
}

impl ColumnLayout {
    /// The canonical offsets 0..21.
    pub fn positional() -> Self {
        let mut indices = [None; Column::COUNT];
        for col in Column::ALL {
            indices[col.position()] = Some(col.position());
        }
        Self {
            indices,
            deviations: Vec::new(),
        }
    }

    /// Look every column up by header name.
    ///
    /// A column whose header is missing reads the canonical offset, moved by
    /// the shift the resolved columns share (if they share one). It is left
    /// empty when that position is owned by a resolved column or lies past
    /// the header row. Deviations are logged, never fatal.
    pub fn resolve(headers: &[String]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();

        let mut found = [None; Column::COUNT];
        for col in Column::ALL {
            found[col.position()] = col.aliases().iter().find_map(|alias| {
                let alias = normalize(alias);
                normalized.iter().position(|h| *h == alias)
            });
        }
        let resolved = found.iter().flatten().count();

        let layout = if resolved == 0 {
            let mut layout = Self::positional();
            layout.deviations.push(LayoutDeviation::HeaderUnrecognized);
            layout
        } else {
            Self::from_found(&found, headers.len())
        };

        for d in &layout.deviations {
            warn!(deviation = %d, "column layout deviates from expected schema");
        }
        debug!(
            resolved,
            required_width = layout.required_width(),
            "resolved column layout"
        );
        layout
    }

    fn from_found(found: &[Option<usize>; Column::COUNT], width: usize) -> Self {
        let shift = common_shift(found).unwrap_or(0);
        let claimed: Vec<usize> = found.iter().flatten().copied().collect();

        let mut indices = [None; Column::COUNT];
        let mut deviations = Vec::new();
        for col in Column::ALL {
            let pos = col.position();
            match found[pos] {
                Some(idx) => {
                    if idx != pos {
                        deviations.push(LayoutDeviation::Moved {
                            column: col,
                            expected: pos,
                            found: idx,
                        });
                    }
                    indices[pos] = Some(idx);
                }
                None => {
                    let fallback = usize::try_from(pos as isize + shift)
                        .ok()
                        .filter(|idx| *idx < width && !claimed.contains(idx));
                    match fallback {
                        Some(idx) => {
                            deviations.push(LayoutDeviation::Unresolved {
                                column: col,
                                fallback: idx,
                            });
                            indices[pos] = Some(idx);
                        }
                        None => deviations.push(LayoutDeviation::Missing { column: col }),
                    }
                }
            }
        }
        Self {
            indices,
            deviations,
        }
    }

    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.indices[column.position()]
    }

    pub fn deviations(&self) -> &[LayoutDeviation] {
        &self.deviations
    }

    pub fn is_canonical(&self) -> bool {
        self.deviations.is_empty()
    }

    /// Fields a row needs before every present column can be read.
    pub fn required_width(&self) -> usize {
        self.indices.iter().flatten().max().map_or(0, |m| m + 1)
    }

    /// Trimmed cell for `column`; absent cells read as empty.
    pub fn cell(&self, row: &[String], column: Column) -> String {
        self.index_of(column)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_headers() -> Vec<String> {
        Column::ALL
            .iter()
            .map(|c| c.header_name().to_string())
            .collect()
    }

    #[test]
    fn canonical_header_resolves_without_deviation() {
        let layout = ColumnLayout::resolve(&canonical_headers());
        assert!(layout.is_canonical());
        assert_eq!(layout, ColumnLayout::positional());
        assert_eq!(layout.required_width(), 22);
    }

    #[test]
    fn header_matching_ignores_case_and_punctuation() {
        let mut headers = canonical_headers();
        headers[4] = "validation method ai".into();
        headers[9] = "  MEDICAL SPECIALTY ".into();
        let layout = ColumnLayout::resolve(&headers);
        assert!(layout.is_canonical());
    }

    #[test]
    fn reordered_columns_are_followed() {
        let mut headers = canonical_headers();
        headers.swap(14, 16); // Domain <-> Modality
        let layout = ColumnLayout::resolve(&headers);
        assert_eq!(layout.index_of(Column::Domain), Some(16));
        assert_eq!(layout.index_of(Column::Modality), Some(14));
        assert_eq!(layout.deviations().len(), 2);
        assert!(layout.deviations().contains(&LayoutDeviation::Moved {
            column: Column::Domain,
            expected: 14,
            found: 16,
        }));
    }

    #[test]
    fn missing_header_falls_back_to_position() {
        let mut headers = canonical_headers();
        headers[21] = "Notes".into();
        let layout = ColumnLayout::resolve(&headers);
        assert_eq!(layout.index_of(Column::KeyCues), Some(21));
        assert_eq!(
            layout.deviations(),
            &[LayoutDeviation::Unresolved {
                column: Column::KeyCues,
                fallback: 21
            }]
        );
    }

    #[test]
    fn unknown_header_row_is_positional() {
        let headers: Vec<String> = (0..22).map(|i| format!("col{}", i)).collect();
        let layout = ColumnLayout::resolve(&headers);
        assert_eq!(layout.deviations(), &[LayoutDeviation::HeaderUnrecognized]);
        assert_eq!(layout.index_of(Column::Task), Some(18));
    }

    #[test]
    fn extra_leading_column_widens_requirement() {
        let mut headers = vec!["Row".to_string()];
        headers.extend(canonical_headers());
        let layout = ColumnLayout::resolve(&headers);
        assert_eq!(layout.index_of(Column::SubmissionNumber), Some(1));
        assert_eq!(layout.required_width(), 23);
    }

    #[test]
    fn fallback_follows_a_consistent_shift() {
        let mut headers = vec!["Row".to_string()];
        headers.extend(canonical_headers());
        headers[22] = "Key Cues (free text)".into();
        let layout = ColumnLayout::resolve(&headers);

        assert_eq!(layout.index_of(Column::DeviceFunction), Some(21));
        assert_eq!(layout.index_of(Column::KeyCues), Some(22));
        assert!(layout.deviations().contains(&LayoutDeviation::Unresolved {
            column: Column::KeyCues,
            fallback: 22,
        }));

        let mut row: Vec<String> = (0..23).map(|i| format!("v{}", i)).collect();
        row[21] = "function".into();
        row[22] = "cues".into();
        assert_eq!(layout.cell(&row, Column::DeviceFunction), "function");
        assert_eq!(layout.cell(&row, Column::KeyCues), "cues");
    }

    #[test]
    fn fallback_never_reuses_a_claimed_position() {
        let mut headers = canonical_headers();
        headers.swap(14, 16); // Domain <-> Modality
        headers[16] = "Area".into(); // Domain header renamed
        let layout = ColumnLayout::resolve(&headers);

        assert_eq!(layout.index_of(Column::Modality), Some(14));
        assert_eq!(layout.index_of(Column::Domain), None);
        assert!(layout.deviations().contains(&LayoutDeviation::Missing {
            column: Column::Domain
        }));

        let row: Vec<String> = (0..22).map(|i| format!("v{}", i)).collect();
        assert_eq!(layout.cell(&row, Column::Domain), "");
        assert_eq!(layout.cell(&row, Column::Modality), "v14");
    }

    #[test]
    fn dropped_trailing_column_reads_empty() {
        let mut headers = canonical_headers();
        headers.pop();
        let layout = ColumnLayout::resolve(&headers);
        assert_eq!(layout.index_of(Column::KeyCues), None);
        assert_eq!(layout.required_width(), 21);
        assert_eq!(
            layout.deviations(),
            &[LayoutDeviation::Missing {
                column: Column::KeyCues
            }]
        );
    }

    #[test]
    fn cell_trims_and_defaults_to_empty() {
        let layout = ColumnLayout::positional();
        let row = vec!["  K123 ".to_string()];
        assert_eq!(layout.cell(&row, Column::SubmissionNumber), "K123");
        assert_eq!(layout.cell(&row, Column::KeyCues), "");
    }
}
