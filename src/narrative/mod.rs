use crate::error::ViewResult;
use crate::source::{self, TabularSource};
use crate::temporal::parse_timestamp;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

/// Where a precomputed text lives: a table keyed by patient and instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStore {
    pub table: String,
    pub patient_column: String,
    pub date_column: String,
    pub text_column: String,
}

impl TextStore {
    pub fn anamnesis() -> Self {
        Self {
            table: "anamnesis_data".to_string(),
            patient_column: "patient".to_string(),
            date_column: "date".to_string(),
            text_column: "generated_anamnesis".to_string(),
        }
    }

    pub fn discharge_report() -> Self {
        Self {
            table: "discharge_reports_generated".to_string(),
            patient_column: "PATIENT".to_string(),
            date_column: "START".to_string(),
            text_column: "generated_discharge_report".to_string(),
        }
    }
}

/// Looks up the text stored for exactly (`patient_id`, `cutoff`).
///
/// Rows with an empty text never match. The first matching row wins.
pub fn lookup_text(
    source: &dyn TabularSource,
    store: &TextStore,
    patient_id: &str,
    cutoff: NaiveDateTime,
) -> ViewResult<Option<String>> {
    let records = source::load_matching(source, &store.table, &store.patient_column, patient_id)?;
    let date_index = records.require_column(&store.date_column)?;
    let text_index = records.require_column(&store.text_column)?;

    let text = records
        .rows
        .iter()
        .filter(|row| row.get(date_index).and_then(|date| parse_timestamp(date)) == Some(cutoff))
        .filter_map(|row| row.get(text_index))
        .find(|text| !text.trim().is_empty())
        .cloned();

    debug!(
        "{} for {} at {}: {}",
        store.table,
        patient_id,
        cutoff,
        if text.is_some() { "found" } else { "not available" }
    );
    Ok(text)
}
