use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Date-only layouts seen in the sheet exports. Month/day order only matters
/// for validity; the year lands in the same place either way.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%b-%Y", "%d %b %Y",
    "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

static YEAR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:-(\d{1,2}))?$").expect("year regex should compile"));

/// Parse a date of authorization and return its year as a 4-digit string.
/// Returns `None` for blank or unparseable input.
pub fn parse_year(raw: &str) -> Option<String> {
    parse_year_num(raw).map(|y| format!("{:04}", y))
}

/// Same as [`parse_year`] but numeric.
pub fn parse_year_num(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let year = parse_date(s).map(|d| d.year()).or_else(|| {
        let caps = YEAR_ONLY.captures(s)?;
        if let Some(month) = caps.get(2) {
            let m: u32 = month.as_str().parse().ok()?;
            if !(1..=12).contains(&m) {
                return None;
            }
        }
        caps[1].parse().ok()
    })?;

    (1000..=9999).contains(&year).then_some(year)
}

/// Best-effort calendar date parse over the known layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_and_slash_dates() {
        assert_eq!(parse_year("2020-05-01").as_deref(), Some("2020"));
        assert_eq!(parse_year("2019/12/31").as_deref(), Some("2019"));
        assert_eq!(parse_year(" 2021-01-01 ").as_deref(), Some("2021"));
    }

    #[test]
    fn us_and_day_first_dates() {
        assert_eq!(parse_year("5/1/2020").as_deref(), Some("2020"));
        assert_eq!(parse_year("12/31/2018").as_deref(), Some("2018"));
        assert_eq!(parse_year("25/12/2017").as_deref(), Some("2017"));
    }

    #[test]
    fn month_name_dates() {
        assert_eq!(parse_year("March 5, 2021").as_deref(), Some("2021"));
        assert_eq!(parse_year("Mar 5, 2021").as_deref(), Some("2021"));
        assert_eq!(parse_year("05-Mar-2016").as_deref(), Some("2016"));
    }

    #[test]
    fn timestamps() {
        assert_eq!(parse_year("2022-07-04T10:00:00Z").as_deref(), Some("2022"));
        assert_eq!(parse_year("2022-07-04 10:00:00").as_deref(), Some("2022"));
        assert_eq!(parse_year("7/4/2022 10:00:00").as_deref(), Some("2022"));
    }

    #[test]
    fn bare_year_and_year_month() {
        assert_eq!(parse_year("2015").as_deref(), Some("2015"));
        assert_eq!(parse_year("2015-06").as_deref(), Some("2015"));
        assert_eq!(parse_year("2015-13"), None);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("   "), None);
        assert_eq!(parse_year("pending"), None);
        assert_eq!(parse_year("13/45/2020"), None);
        assert_eq!(parse_year("N/A"), None);
    }
}
