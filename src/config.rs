use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::aggregate::CategoryField;
use crate::error::{PipelineError, Result};
use crate::legacy::SummaryLayout;
use crate::schema::Column;

/// Published CSV export of the detailed device database.
pub const DETAILED_DATA_SOURCE: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vRlnJBLSPzj-3w5oqi27JyS3zxVxM83oGKQXcQRlrLBfwtaAsnZTKicorsioKEj2oYPAPIRJpwle4rv/pub?output=csv&gid=123494604";

const PUBLISHED_BASE: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vRlnJBLSPzj-3w5oqi27JyS3zxVxM83oGKQXcQRlrLBfwtaAsnZTKicorsioKEj2oYPAPIRJpwle4rv/pub";

/// Sheet ids of the old per-dimension summary tabs.
static LEGACY_SHEET_GIDS: &[(CategoryField, &str)] = &[
    (CategoryField::DeviceType, "336724584"),
    (CategoryField::Domain, "1661948723"),
    (CategoryField::Modality, "986877468"),
    (CategoryField::Task, "67316351"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source_url: String,
    /// Per-dimension summary sheet URLs for the legacy layout.
    pub legacy_sheets: BTreeMap<CategoryField, String>,
    pub legacy_category_col: usize,
    pub legacy_first_year_col: usize,
    pub output_dir: PathBuf,
    /// Minimum fields per data row; raised to whatever the resolved layout needs.
    pub min_columns: usize,
    pub request_timeout_secs: u64,
    /// Warn when more than this share of rows is dropped.
    pub max_drop_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        let legacy_sheets = LEGACY_SHEET_GIDS
            .iter()
            .map(|(field, gid)| {
                (
                    *field,
                    format!("{}?gid={}&single=true&output=csv", PUBLISHED_BASE, gid),
                )
            })
            .collect();

        Self {
            source_url: DETAILED_DATA_SOURCE.to_string(),
            legacy_sheets,
            legacy_category_col: 0,
            legacy_first_year_col: 1,
            output_dir: PathBuf::from("output"),
            min_columns: Column::COUNT,
            request_timeout_secs: 30,
            max_drop_ratio: 0.05,
        }
    }
}

impl Config {
    /// Defaults, overlaid with the YAML file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| {
                    PipelineError::Config(format!(
                        "Failed to read config file '{}': {}",
                        p.display(),
                        e
                    ))
                })?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_url("source_url", &self.source_url)?;
        for (field, url) in &self.legacy_sheets {
            check_url(&format!("legacy_sheets.{}", field), url)?;
        }
        if self.min_columns == 0 {
            return Err(PipelineError::Config("min_columns must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_drop_ratio) {
            return Err(PipelineError::Config(format!(
                "max_drop_ratio must be within 0..=1, got {}",
                self.max_drop_ratio
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn summary_layout(&self) -> SummaryLayout {
        SummaryLayout {
            category_col: self.legacy_category_col,
            first_year_col: self.legacy_first_year_col,
        }
    }
}

fn check_url(name: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| PipelineError::Config(format!("{} is not a valid URL ({}): {}", name, e, raw)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PipelineError::Config(format!(
            "{} must be http(s), got scheme {:?}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.min_columns, 22);
        assert_eq!(cfg.legacy_sheets.len(), 4);
        assert!(cfg.legacy_sheets[&CategoryField::Task].contains("gid=67316351"));
    }

    #[test]
    fn yaml_overrides_only_what_it_names() {
        let cfg = Config::from_yaml(
            "source_url: https://example.com/db.csv\nlegacy_sheets:\n  domain: https://example.com/d.csv\n",
        )
        .unwrap();
        assert_eq!(cfg.source_url, "https://example.com/db.csv");
        assert_eq!(cfg.legacy_sheets.len(), 1);
        assert_eq!(cfg.request_timeout_secs, 30);
        cfg.validate().unwrap();
    }

    #[test]
    fn load_reads_a_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "output_dir: exports\nmin_columns: 25").unwrap();
        let cfg = Config::load(Some(tmp.path())).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("exports"));
        assert_eq!(cfg.min_columns, 25);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let mut cfg = Config::default();
        cfg.source_url = "not a url".into();
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));

        let mut cfg = Config::default();
        cfg.source_url = "ftp://example.com/db.csv".into();
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));

        let mut cfg = Config::default();
        cfg.min_columns = 0;
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));

        let mut cfg = Config::default();
        cfg.max_drop_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
