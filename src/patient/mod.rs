use crate::config::DemoPatient;
use crate::error::{ViewResult, ViewerError};
use crate::source::{self, TabularSource};
use crate::temporal::{format_date_option, parse_timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const PATIENT_ID_COLUMN: &str = "Id";

/// Demographic fields from the patient master table, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

impl PatientInfo {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value.as_str())
    }
}

/// Upper-cases the first letter and lower-cases the rest: `BIRTHDATE` -> `Birthdate`.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Looks a patient up in the master table. The leading identifier column is
/// not repeated in the returned fields.
pub fn basic_info(
    source: &dyn TabularSource,
    table: &str,
    patient_id: &str,
) -> ViewResult<Option<PatientInfo>> {
    let records = source::load_matching(source, table, PATIENT_ID_COLUMN, patient_id)?;
    let Some(row) = records.rows.first() else {
        return Ok(None);
    };

    let fields = records
        .headers
        .iter()
        .zip(row)
        .skip(1)
        .map(|(header, value)| (capitalize(header), value.clone()))
        .collect();

    Ok(Some(PatientInfo {
        id: patient_id.to_string(),
        fields,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOption {
    pub instant: NaiveDateTime,
    pub label: String,
}

pub fn date_options(patient: &DemoPatient) -> ViewResult<Vec<DateOption>> {
    patient
        .cutoffs
        .iter()
        .map(|raw| {
            let instant = parse_timestamp(raw).ok_or_else(|| ViewerError::InvalidCutoff(raw.clone()))?;
            Ok(DateOption {
                instant,
                label: format_date_option(instant),
            })
        })
        .collect()
}

/// The most recent offered cutoff, which is the preselected one.
pub fn default_cutoff(patient: &DemoPatient) -> ViewResult<NaiveDateTime> {
    date_options(patient)?
        .last()
        .map(|option| option.instant)
        .ok_or_else(|| ViewerError::UnknownPatient(format!("{} has no cutoff dates", patient.id)))
}
