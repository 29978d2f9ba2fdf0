// src/export.rs

use chrono::NaiveDate;
use csv::WriterBuilder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregate::{CategoryField, ProcessedData, View};
use crate::error::PipelineError;
use crate::filter::category_total;
use crate::record::DeviceRecord;

/// Columns of the detailed-record export.
pub const RECORD_HEADERS: [&str; 11] = [
    "Submission #",
    "Date",
    "Device Name",
    "Developer",
    "Medical Specialty",
    "Device Type",
    "Domain",
    "Modality",
    "Task",
    "Validation Method (AI)",
    "RCT (AI)",
];

/// `device-type_annual_data.csv` and friends.
pub fn matrix_file_name(field: CategoryField, view: View) -> String {
    format!("{}_{}_data.csv", field, view.as_str())
}

pub fn records_file_name(date: NaiveDate) -> String {
    format!("fda_detailed_data_{}.csv", date.format("%Y-%m-%d"))
}

/// Write `[Category, <years...>, Total]` then one row per category in
/// `categories` order. Missing cells are written as 0.
pub fn write_matrix_csv<W: Write>(
    writer: W,
    data: &ProcessedData,
    view: View,
    categories: &[String],
) -> Result<(), PipelineError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let matrix = data.matrix(view);

    let mut header = Vec::with_capacity(data.years.len() + 2);
    header.push("Category".to_string());
    header.extend(data.years.iter().cloned());
    header.push("Total".to_string());
    wtr.write_record(&header)?;

    for category in categories {
        let mut row = Vec::with_capacity(header.len());
        row.push(category.clone());
        row.extend(
            data.years
                .iter()
                .map(|y| matrix.get(category, y).to_string()),
        );
        row.push(category_total(data, category).to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_records_csv<W: Write>(
    writer: W,
    records: &[&DeviceRecord],
) -> Result<(), PipelineError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(RECORD_HEADERS)?;
    for r in records {
        wtr.write_record([
            &r.submission_number,
            &r.date_of_authorization,
            &r.device_name,
            &r.device_developer,
            &r.medical_specialty,
            &r.device_type,
            &r.domain,
            &r.modality,
            &r.task,
            &r.validation_method_ai,
            &r.rct_ai,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a matrix export into `dir`, returning the file path.
pub fn export_matrix(
    dir: &Path,
    field: CategoryField,
    data: &ProcessedData,
    view: View,
    categories: &[String],
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(matrix_file_name(field, view));
    write_matrix_csv(File::create(&path)?, data, view, categories)?;
    info!(path = %path.display(), rows = categories.len(), "wrote matrix export");
    Ok(path)
}

pub fn export_records(
    dir: &Path,
    date: NaiveDate,
    records: &[&DeviceRecord],
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(records_file_name(date));
    write_records_csv(File::create(&path)?, records)?;
    info!(path = %path.display(), rows = records.len(), "wrote record export");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::process_dimension;
    use crate::process::parse_csv;
    use tempfile::tempdir;

    fn rec(date: &str, domain: &str) -> DeviceRecord {
        DeviceRecord {
            date_of_authorization: date.to_string(),
            domain: domain.to_string(),
            device_name: "Scan, Pro".to_string(),
            ..Default::default()
        }
    }

    fn data() -> ProcessedData {
        process_dimension(
            &[
                rec("2020-01-01", "Chest, Lung"),
                rec("2020-02-01", "Chest, Lung"),
                rec("2021-01-01", "Neuro"),
            ],
            CategoryField::Domain,
        )
    }

    #[test]
    fn annual_matrix_export() {
        let data = data();
        let mut buf = Vec::new();
        write_matrix_csv(&mut buf, &data, View::Annual, &data.categories).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Category,2020,2021,Total\n\"Chest, Lung\",2,0,2\nNeuro,0,1,1\n"
        );
    }

    #[test]
    fn cumulative_export_total_is_last_running_value() {
        let data = data();
        let mut buf = Vec::new();
        write_matrix_csv(&mut buf, &data, View::Cumulative, &data.categories).unwrap();
        let table = parse_csv(&String::from_utf8(buf).unwrap()).unwrap();
        assert_eq!(table.rows[0], vec!["Chest, Lung", "2", "2", "2"]);
        assert_eq!(table.rows[1], vec!["Neuro", "0", "1", "1"]);
    }

    #[test]
    fn record_export_quotes_delimiters() {
        let r = rec("2020-01-01", "Chest");
        let mut buf = Vec::new();
        write_records_csv(&mut buf, &[&r]).unwrap();
        let table = parse_csv(&String::from_utf8(buf).unwrap()).unwrap();
        assert_eq!(table.headers.len(), RECORD_HEADERS.len());
        assert_eq!(table.rows[0][2], "Scan, Pro");
        assert_eq!(table.rows[0][6], "Chest");
    }

    #[test]
    fn exports_land_in_dir_with_expected_names() {
        let dir = tempdir().unwrap();
        let data = data();
        let path = export_matrix(
            dir.path(),
            CategoryField::Domain,
            &data,
            View::Annual,
            &data.categories,
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "domain_annual_data.csv");
        assert!(fs::read_to_string(&path).unwrap().starts_with("Category,"));

        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = export_records(dir.path(), date, &[]).unwrap();
        assert_eq!(path.file_name().unwrap(), "fda_detailed_data_2024-03-09.csv");
    }
}
