use crate::error::{ViewResult, ViewerError};
use crate::schema::Category;
use crate::source::TabularSource;
use crate::temporal::FilteredRecords;
use crate::view;
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const DESCRIPTION_SEPARATOR: &str = "; ";

fn parenthetical() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*\(.*?\)").expect("parenthetical pattern is valid"))
}

/// Removes parenthesised annotations, e.g. `"Fever (finding)"` becomes `"Fever"`.
pub fn strip_parenthetical(text: &str) -> String {
    parenthetical().replace_all(text, "").into_owned()
}

/// All of one category's records on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub compare_date: NaiveDate,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category: Category,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTimeline {
    pub entries: Vec<TimelineEntry>,
    pub skipped: Vec<SkippedCategory>,
}

impl AggregatedTimeline {
    /// Orders entries by category label, then by date.
    pub fn assemble(mut entries: Vec<TimelineEntry>, skipped: Vec<SkippedCategory>) -> Self {
        entries.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.compare_date.cmp(&b.compare_date))
        });
        Self { entries, skipped }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct category labels in entry order.
    pub fn categories(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !labels.contains(&entry.category.as_str()) {
                labels.push(&entry.category);
            }
        }
        labels
    }
}

/// Collapses one category's filtered rows into one entry per calendar day.
pub fn aggregate_category(category: Category, records: &FilteredRecords) -> ViewResult<Vec<TimelineEntry>> {
    let column = category.schema().description_column;
    let description_index = records
        .column_index(column)
        .ok_or_else(|| ViewerError::schema(&records.table, column))?;

    let mut by_day: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for row in &records.rows {
        let descriptions = by_day.entry(row.timestamp.date()).or_default();
        match row.values.get(description_index) {
            Some(raw) if !raw.is_empty() => descriptions.push(strip_parenthetical(raw)),
            _ => {}
        }
    }

    let label = category.label();
    Ok(by_day
        .into_iter()
        .map(|(compare_date, descriptions)| TimelineEntry {
            compare_date,
            category: label.clone(),
            description: descriptions.join(DESCRIPTION_SEPARATOR),
        })
        .collect())
}

/// Turns a schema failure of one category into a [`SkippedCategory`]; any
/// other error is passed through.
pub fn isolate_schema_error<T>(
    category: Category,
    result: ViewResult<T>,
) -> ViewResult<Result<T, SkippedCategory>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) if err.is_schema() => {
            warn!("Leaving {} out of the timeline: {}", category, err);
            Ok(Err(SkippedCategory {
                category,
                reason: err.to_string(),
            }))
        }
        Err(err) => Err(err),
    }
}

/// Merges every category's records into one chronological timeline.
///
/// A category whose table lacks an expected column is skipped and reported
/// in [`AggregatedTimeline::skipped`]; any other failure aborts.
pub fn build_timeline(
    source: &dyn TabularSource,
    patient_id: &str,
    cutoff: NaiveDateTime,
) -> ViewResult<AggregatedTimeline> {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for category in Category::ALL {
        let result = view::build_filtered(source, category, patient_id, cutoff)
            .and_then(|records| aggregate_category(category, &records));
        match isolate_schema_error(category, result)? {
            Ok(category_entries) => entries.extend(category_entries),
            Err(skip) => skipped.push(skip),
        }
    }

    let timeline = AggregatedTimeline::assemble(entries, skipped);
    info!("Timeline for {} has {} entries", patient_id, timeline.len());
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{fixtures, CsvDirectory, RecordSet};
    use crate::temporal::{filter_records, parse_timestamp};
    use tempfile::TempDir;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn condition_records(rows: &[(&str, &str)]) -> FilteredRecords {
        let records = RecordSet::new(
            "conditions",
            vec!["START".into(), "PATIENT".into(), "DESCRIPTION".into()],
            rows.iter()
                .map(|(start, desc)| vec![start.to_string(), "P1".to_string(), desc.to_string()])
                .collect(),
        );
        filter_records(records, ts("2030-01-01"), "START", None).unwrap()
    }

    const HEADER_ONLY: &[(&str, &str)] = &[
        ("procedures", "START,PATIENT,DESCRIPTION\n"),
        ("observations", "DATE,PATIENT,DESCRIPTION\n"),
        ("medications", "START,STOP,PATIENT,DESCRIPTION\n"),
        ("immunizations", "DATE,PATIENT,DESCRIPTION\n"),
        ("imaging_studies", "DATE,PATIENT,BODYSITE_DESCRIPTION\n"),
        ("encounters", "START,PATIENT,DESCRIPTION\n"),
        ("conditions", "START,PATIENT,DESCRIPTION\n"),
        ("careplans", "START,PATIENT,DESCRIPTION\n"),
        ("allergies", "START,PATIENT,DESCRIPTION\n"),
    ];

    fn data_dir(overrides: &[(&str, &str)]) -> TempDir {
        let tables: Vec<(&str, &str)> = HEADER_ONLY
            .iter()
            .map(|(table, body)| {
                overrides
                    .iter()
                    .find(|(name, _)| name == table)
                    .copied()
                    .unwrap_or((*table, *body))
            })
            .collect();
        fixtures::data_dir(&tables)
    }

    #[test]
    fn test_strip_parenthetical() {
        assert_eq!(strip_parenthetical("Fever (finding)"), "Fever");
        assert_eq!(strip_parenthetical("Viral sinusitis (disorder)"), "Viral sinusitis");
        assert_eq!(strip_parenthetical("Body Height"), "Body Height");
        assert_eq!(strip_parenthetical("Chest (upper) X-ray (procedure)"), "Chest X-ray");
    }

    #[test]
    fn test_same_day_merge() {
        let records = condition_records(&[
            ("2021-06-01T08:00:00", "A (finding)"),
            ("2021-06-01T17:00:00", "B"),
            ("2021-06-02", "C"),
        ]);
        let entries = aggregate_category(Category::Conditions, &records).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].compare_date, date("2021-06-01"));
        assert_eq!(entries[0].description, "A; B");
        assert_eq!(entries[1].description, "C");
        assert_eq!(entries[1].category, "Conditions");
    }

    #[test]
    fn test_null_descriptions_left_out_of_merge() {
        let records = condition_records(&[("2021-06-01", "A"), ("2021-06-01", "")]);
        let entries = aggregate_category(Category::Conditions, &records).unwrap();
        assert_eq!(entries[0].description, "A");
    }

    #[test]
    fn test_short_row_has_null_description() {
        let mut records = condition_records(&[("2021-06-01", "A"), ("2021-06-01", "B")]);
        records.rows[1].values.truncate(1);

        let entries = aggregate_category(Category::Conditions, &records).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "A");
    }

    #[test]
    fn test_isolate_schema_error() {
        let skipped = isolate_schema_error::<()>(Category::Allergies, Err(ViewerError::schema("allergies", "START")))
            .unwrap()
            .unwrap_err();
        assert_eq!(skipped.category, Category::Allergies);
        assert!(skipped.reason.contains("START"));

        assert_eq!(isolate_schema_error(Category::Allergies, Ok(3)).unwrap(), Ok(3));

        let err = isolate_schema_error::<()>(Category::Allergies, Err(ViewerError::NotFound("allergies.csv".into())))
            .unwrap_err();
        assert!(matches!(err, ViewerError::NotFound(_)));
    }

    #[test]
    fn test_entries_sorted_by_category_then_date() {
        let dir = data_dir(&[
            (
                "procedures",
                "START,PATIENT,DESCRIPTION\n2020-05-01,P1,Appendectomy\n2019-01-01,P1,Biopsy\n",
            ),
            (
                "conditions",
                "START,PATIENT,DESCRIPTION\n2021-06-01,P1,Fever (finding)\n2018-02-03,P1,Asthma\n",
            ),
            (
                "imaging_studies",
                "DATE,PATIENT,BODYSITE_DESCRIPTION\n2019-07-07T10:00:00Z,P1,Chest (body structure)\n2017-07-07,P1,Knee\n",
            ),
        ]);
        let source = CsvDirectory::new(dir.path());

        let timeline = build_timeline(&source, "P1", ts("2022-01-01")).unwrap();
        let keys: Vec<(&str, String)> = timeline
            .entries
            .iter()
            .map(|e| (e.category.as_str(), e.compare_date.to_string()))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("Conditions", "2018-02-03".to_string()),
                ("Conditions", "2021-06-01".to_string()),
                ("Imaging studies", "2017-07-07".to_string()),
                ("Imaging studies", "2019-07-07".to_string()),
                ("Procedures", "2019-01-01".to_string()),
                ("Procedures", "2020-05-01".to_string()),
            ]
        );
        assert_eq!(timeline.entries[3].description, "Chest");
        assert_eq!(timeline.categories(), vec!["Conditions", "Imaging studies", "Procedures"]);
    }

    #[test]
    fn test_conditions_scenario() {
        let dir = data_dir(&[(
            "conditions",
            "START,PATIENT,DESCRIPTION\n2021-06-01,P1,Fever (finding)\n2022-06-01,P1,Flu\n",
        )]);
        let source = CsvDirectory::new(dir.path());

        let timeline = build_timeline(&source, "P1", ts("2022-01-01")).unwrap();
        assert_eq!(
            timeline.entries,
            vec![TimelineEntry {
                compare_date: date("2021-06-01"),
                category: "Conditions".to_string(),
                description: "Fever".to_string(),
            }]
        );
    }

    #[test]
    fn test_schema_error_isolated_to_one_category() {
        let dir = data_dir(&[
            ("allergies", "PATIENT,DESCRIPTION\nP1,Peanuts\n"),
            ("encounters", "START,PATIENT,DESCRIPTION\n2020-01-01,P1,Checkup\n"),
            ("careplans", "START,PATIENT,DESCRIPTION\n2020-02-01,P1,Diet\n"),
        ]);
        let source = CsvDirectory::new(dir.path());

        let timeline = build_timeline(&source, "P1", ts("2022-01-01")).unwrap();
        assert_eq!(timeline.categories(), vec!["Careplans", "Encounters"]);
        assert_eq!(timeline.skipped.len(), 1);
        assert_eq!(timeline.skipped[0].category, Category::Allergies);
    }

    #[test]
    fn test_missing_table_fails_the_timeline() {
        let dir = fixtures::data_dir(&[("procedures", "START,PATIENT,DESCRIPTION\n")]);
        let source = CsvDirectory::new(dir.path());

        let err = build_timeline(&source, "P1", ts("2022-01-01")).unwrap_err();
        assert!(matches!(err, ViewerError::NotFound(_)));
    }
}
