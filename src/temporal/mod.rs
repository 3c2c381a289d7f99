use crate::error::{ViewResult, ViewerError};
use crate::schema::PATIENT_COLUMN;
use crate::source::RecordSet;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OPTION_FORMAT: &str = "%Y-%m-%d at %I:%M:%S %p";

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"];

/// Parses a timestamp cell into a timezone-naive instant.
///
/// Offsets are discarded and the wall-clock time kept. A bare date is
/// midnight. Returns `None` for empty or unrecognised input.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parses the caller-supplied cutoff. Also accepts the date-option display form.
pub fn parse_cutoff(raw: &str) -> ViewResult<NaiveDateTime> {
    parse_timestamp(raw)
        .or_else(|| NaiveDateTime::parse_from_str(raw.trim(), OPTION_FORMAT).ok())
        .ok_or_else(|| ViewerError::InvalidCutoff(raw.to_string()))
}

/// `YYYY-MM-DD` at exactly midnight, `YYYY-MM-DD HH:MM:SS` otherwise.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 {
        ts.format(DATE_FORMAT).to_string()
    } else {
        ts.format(DATE_TIME_FORMAT).to_string()
    }
}

pub fn format_date(ts: NaiveDateTime) -> String {
    ts.format(DATE_FORMAT).to_string()
}

/// Display form used for selectable cutoff dates, e.g. `2022-05-01 at 09:04:48 AM`.
pub fn format_date_option(ts: NaiveDateTime) -> String {
    ts.format(OPTION_FORMAT).to_string()
}

/// A row that survived the cutoff, with its parsed instants.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRow {
    pub timestamp: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
    pub values: Vec<String>,
}

/// Cutoff-bounded rows in chronological order, timestamps not yet formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRecords {
    pub table: String,
    pub headers: Vec<String>,
    pub timestamp_index: usize,
    pub stop_index: Option<usize>,
    pub rows: Vec<TimedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub rank: usize,
    pub values: Vec<String>,
}

/// Display-ready rows: formatted timestamps and a 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedRecords {
    pub headers: Vec<String>,
    pub rows: Vec<RankedRow>,
}

impl OrderedRecords {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Vec<&str> {
        match self.headers.iter().position(|h| h == name) {
            Some(index) => self
                .rows
                .iter()
                .map(|row| row.values.get(index).map_or("", String::as_str))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Drops unparseable timestamps and the patient column, keeps rows at or
/// before `cutoff` and sorts them chronologically.
pub fn filter_records(
    records: RecordSet,
    cutoff: NaiveDateTime,
    timestamp_column: &str,
    stop_column: Option<&str>,
) -> ViewResult<FilteredRecords> {
    records.require_column(timestamp_column)?;
    let patient_index = records.column_index(PATIENT_COLUMN);

    let headers: Vec<String> = records
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != patient_index)
        .map(|(_, h)| h.clone())
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let timestamp_index = position(timestamp_column)
        .ok_or_else(|| ViewerError::schema(&records.table, timestamp_column))?;
    let stop_index = stop_column.and_then(position);

    let total = records.rows.len();
    let mut unparseable = 0;
    let mut rows = Vec::with_capacity(total);

    for row in records.rows {
        let mut values: Vec<String> = row
            .into_iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != patient_index)
            .map(|(_, v)| v)
            .collect();
        // Missing trailing cells are nulls.
        values.resize(headers.len(), String::new());

        let Some(timestamp) = values.get(timestamp_index).and_then(|v| parse_timestamp(v)) else {
            unparseable += 1;
            continue;
        };
        if timestamp > cutoff {
            continue;
        }

        let stop = stop_index
            .and_then(|i| values.get(i))
            .and_then(|v| parse_timestamp(v));
        rows.push(TimedRow { timestamp, stop, values });
    }

    rows.sort_by_key(|row| row.timestamp);

    debug!(
        "{}: kept {} of {} rows ({} without a parseable {})",
        records.table,
        rows.len(),
        total,
        unparseable,
        timestamp_column
    );

    Ok(FilteredRecords {
        table: records.table,
        headers,
        timestamp_index,
        stop_index,
        rows,
    })
}

impl FilteredRecords {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Renders timestamps for display and assigns 1-based ranks.
    pub fn format(&self) -> OrderedRecords {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut values = row.values.clone();
                values.resize(self.headers.len(), String::new());
                if let Some(cell) = values.get_mut(self.timestamp_index) {
                    *cell = format_timestamp(row.timestamp);
                }
                if let Some(cell) = self.stop_index.and_then(|i| values.get_mut(i)) {
                    *cell = row.stop.map(format_timestamp).unwrap_or_default();
                }
                RankedRow { rank: i + 1, values }
            })
            .collect();

        OrderedRecords {
            headers: self.headers.clone(),
            rows,
        }
    }
}

pub fn filter_and_format(
    records: RecordSet,
    cutoff: NaiveDateTime,
    timestamp_column: &str,
    stop_column: Option<&str>,
) -> ViewResult<OrderedRecords> {
    Ok(filter_records(records, cutoff, timestamp_column, stop_column)?.format())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn records(rows: &[(&str, &str, &str)]) -> RecordSet {
        RecordSet::new(
            "medications",
            vec!["START".into(), "STOP".into(), "PATIENT".into(), "DESCRIPTION".into()],
            rows.iter()
                .map(|(start, stop, desc)| {
                    vec![start.to_string(), stop.to_string(), "P1".to_string(), desc.to_string()]
                })
                .collect(),
        )
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2015, 10, 31).unwrap().and_hms_opt(11, 2, 48).unwrap();
        assert_eq!(parse_timestamp("2015-10-31T11:02:48Z"), Some(expected));
        assert_eq!(parse_timestamp("2015-10-31T11:02:48+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2015-10-31 11:02:48"), Some(expected));
        assert_eq!(parse_timestamp("2015-10-31T11:02:48"), Some(expected));
        assert_eq!(
            parse_timestamp("2015-10-31"),
            NaiveDate::from_ymd_opt(2015, 10, 31).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_parse_cutoff_accepts_option_form() {
        let cutoff = parse_cutoff("2022-05-01 at 09:04:48 AM").unwrap();
        assert_eq!(cutoff, ts("2022-05-01T09:04:48"));
        assert_eq!(format_date_option(cutoff), "2022-05-01 at 09:04:48 AM");
        assert!(matches!(parse_cutoff("yesterday"), Err(ViewerError::InvalidCutoff(_))));
    }

    #[test]
    fn test_midnight_formatting() {
        assert_eq!(format_timestamp(ts("2020-01-01T00:00:00")), "2020-01-01");
        assert_eq!(format_timestamp(ts("2020-01-01T08:30:00")), "2020-01-01 08:30:00");
    }

    #[test]
    fn test_cutoff_boundary_is_inclusive() {
        let input = records(&[
            ("2022-01-01T00:00:00.000001", "", "after"),
            ("2022-01-01T00:00:00Z", "", "at"),
        ]);
        let output = filter_and_format(input, ts("2022-01-01"), "START", Some("STOP")).unwrap();

        assert_eq!(output.column("DESCRIPTION"), vec!["at"]);
        assert_eq!(output.column("START"), vec!["2022-01-01"]);
    }

    #[test]
    fn test_sort_is_chronological_not_lexicographic() {
        let input = records(&[
            ("2020-01-02", "", "c"),
            ("2020-01-01T08:30:00", "", "b"),
            ("2020-01-01", "", "a"),
            ("garbage", "", "dropped"),
        ]);
        let output = filter_and_format(input, ts("2021-01-01"), "START", None).unwrap();

        assert_eq!(output.column("DESCRIPTION"), vec!["a", "b", "c"]);
        assert_eq!(output.column("START"), vec!["2020-01-01", "2020-01-01 08:30:00", "2020-01-02"]);
        assert_eq!(output.rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_patient_column_dropped_and_stop_formatted() {
        let input = records(&[
            ("2020-01-01T10:00:00Z", "2020-02-01T00:00:00Z", "Amoxicillin"),
            ("2020-03-01T10:00:00Z", "", "Ibuprofen"),
        ]);
        let output = filter_and_format(input, ts("2021-01-01"), "START", Some("STOP")).unwrap();

        assert_eq!(output.headers, vec!["START", "STOP", "DESCRIPTION"]);
        assert_eq!(output.column("STOP"), vec!["2020-02-01", ""]);
    }

    #[test]
    fn test_everything_after_cutoff_is_empty() {
        let input = records(&[("2023-01-01", "", "late")]);
        let output = filter_and_format(input, ts("2022-01-01"), "START", None).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_short_row_reads_missing_cells_as_null() {
        let input = RecordSet::new(
            "medications",
            vec!["START".into(), "STOP".into(), "DESCRIPTION".into()],
            vec![vec!["2020-01-01".to_string()]],
        );
        let filtered = filter_records(input, ts("2021-01-01"), "START", Some("STOP")).unwrap();
        assert_eq!(filtered.rows[0].stop, None);
        assert_eq!(filtered.rows[0].values.len(), 3);

        let output = filtered.format();
        assert_eq!(output.column("START"), vec!["2020-01-01"]);
        assert_eq!(output.column("STOP"), vec![""]);
        assert_eq!(output.column("DESCRIPTION"), vec![""]);
    }

    #[test]
    fn test_missing_timestamp_column() {
        let input = records(&[("2020-01-01", "", "a")]);
        let err = filter_records(input, ts("2022-01-01"), "DATE", None).unwrap_err();
        assert!(err.is_schema());
    }
}
