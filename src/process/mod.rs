// src/process/mod.rs
use csv::ReaderBuilder;
use tracing::{debug, instrument, trace};

use crate::error::ParseError;

pub mod date_parser;
pub mod utils;

pub use date_parser::parse_year;
pub use utils::split_code_suffix;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Column names, from the first non-blank row of the export.
    pub headers: Vec<String>,
    /// Every following row in source order, one String per field.
    pub rows: Vec<Vec<String>>,
    /// Rows whose fields were all blank; never emitted.
    pub blank_rows: usize,
}

/// Parse CSV text into a header row plus data rows.
pub fn parse_csv(text: &str) -> Result<RawTable, ParseError> {
    parse_csv_bytes(text.as_bytes())
}

/// Parse raw CSV bytes. Quoted fields may contain the delimiter, newlines and
/// doubled quotes. Records with fewer fields than the header are kept as-is;
/// rejecting them is the record mapper's job.
#[instrument(level = "debug", skip(data), fields(bytes = data.len()))]
pub fn parse_csv_bytes(data: &[u8]) -> Result<RawTable, ParseError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data);

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // keep this so records with different field-counts work
        .from_reader(data);

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut blank_rows = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| ParseError::Malformed {
            line: e.position().map(|p| p.line()).unwrap_or(idx as u64 + 1),
            message: e.to_string(),
        })?;

        if record.iter().all(|f| f.trim().is_empty()) {
            trace!(record = idx, "skipping blank row");
            blank_rows += 1;
            continue;
        }

        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        match headers {
            None => headers = Some(fields),
            Some(_) => rows.push(fields),
        }
    }

    let headers = headers.ok_or(ParseError::Empty)?;
    debug!(
        columns = headers.len(),
        rows = rows.len(),
        blank_rows,
        "parsed CSV"
    );

    Ok(RawTable {
        headers,
        rows,
        blank_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_split_from_data_rows() {
        let table = parse_csv("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows, vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
        assert_eq!(table.blank_rows, 0);
    }

    #[test]
    fn quoted_fields_keep_delimiters_newlines_and_quotes() {
        let text = "name,notes\n\"Acme, Inc.\",\"line one\nline two\"\n\"Say \"\"hi\"\"\",x\n";
        let table = parse_csv(text).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "Acme, Inc.");
        assert_eq!(table.rows[0][1], "line one\nline two");
        assert_eq!(table.rows[1][0], "Say \"hi\"");
    }

    #[test]
    fn trailing_blank_lines_are_not_rows() {
        let table = parse_csv("a,b\n1,2\n\n\n").unwrap();
        assert_eq!(table.rows.len(), 1);

        let table = parse_csv("a,b\r\n1,2\r\n,\r\n").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.blank_rows, 1);
    }

    #[test]
    fn short_rows_are_kept_for_the_mapper() {
        let table = parse_csv("a,b,c\n1\n1,2,3\n").unwrap();
        assert_eq!(table.rows[0], vec!["1"]);
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn byte_order_mark_is_stripped() {
        let table = parse_csv("\u{feff}Submission Number,Date\nK1,2020-01-01\n").unwrap();
        assert_eq!(table.headers[0], "Submission Number");
    }

    #[test]
    fn empty_text_has_no_header() {
        assert!(matches!(parse_csv(""), Err(ParseError::Empty)));
        assert!(matches!(parse_csv("\n\n ,\n"), Err(ParseError::Empty)));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let bytes = b"a,b\n\xff\xfe,2\n";
        match parse_csv_bytes(bytes) {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }
}
