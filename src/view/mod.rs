use crate::error::{ViewResult, ViewerError};
use crate::schema::{Category, DATE_COLUMN, START_COLUMN, STOP_COLUMN};
use crate::source::{self, RecordSet, TabularSource};
use crate::temporal::{self, FilteredRecords, OrderedRecords};
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

/// One category's records for a patient, as of a cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerCategoryView {
    pub category: Category,
    pub patient_id: String,
    pub cutoff: NaiveDateTime,
    pub records: OrderedRecords,
}

impl PerCategoryView {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn title(&self) -> String {
        if self.is_empty() {
            format!("{} (NA)", self.category.label())
        } else {
            self.category.label()
        }
    }

    pub fn empty_message(&self) -> String {
        format!(
            "Patient has no known {} until {}.",
            self.category,
            temporal::format_date(self.cutoff)
        )
    }
}

/// Primary timestamp column: `START` when present, otherwise `DATE`.
pub fn primary_timestamp_column(records: &RecordSet) -> ViewResult<&'static str> {
    if records.has_column(START_COLUMN) {
        Ok(START_COLUMN)
    } else if records.has_column(DATE_COLUMN) {
        Ok(DATE_COLUMN)
    } else {
        Err(ViewerError::schema(
            &records.table,
            &format!("{} or {}", START_COLUMN, DATE_COLUMN),
        ))
    }
}

/// Loads and filters one category without formatting its timestamps.
pub fn build_filtered(
    source: &dyn TabularSource,
    category: Category,
    patient_id: &str,
    cutoff: NaiveDateTime,
) -> ViewResult<FilteredRecords> {
    let records = source::load(source, category, patient_id)?;
    let timestamp_column = primary_timestamp_column(&records)?;
    let stop_column = Some(STOP_COLUMN).filter(|column| records.has_column(column));

    let filtered = temporal::filter_records(records, cutoff, timestamp_column, stop_column)?;
    debug!("{} visible {} records for {}", filtered.len(), category, patient_id);
    Ok(filtered)
}

pub fn build_view(
    source: &dyn TabularSource,
    category: Category,
    patient_id: &str,
    cutoff: NaiveDateTime,
) -> ViewResult<PerCategoryView> {
    let filtered = build_filtered(source, category, patient_id, cutoff)?;
    Ok(PerCategoryView {
        category,
        patient_id: patient_id.to_string(),
        cutoff,
        records: filtered.format(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MedicationEvent {
    Point { at: NaiveDateTime },
    Interval { start: NaiveDateTime, stop: NaiveDateTime },
}

impl MedicationEvent {
    /// A missing stop, or one equal to the start, makes a point event.
    pub fn classify(start: NaiveDateTime, stop: Option<NaiveDateTime>) -> Self {
        match stop {
            Some(stop) if stop != start => MedicationEvent::Interval { start, stop },
            _ => MedicationEvent::Point { at: start },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSeries {
    pub description: String,
    pub events: Vec<MedicationEvent>,
}

/// Medication events bucketed per description, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationTimeline {
    pub series: Vec<MedicationSeries>,
}

impl MedicationTimeline {
    pub fn from_records(records: &FilteredRecords) -> ViewResult<Self> {
        let column = Category::Medications.schema().description_column;
        let description_index = records
            .column_index(column)
            .ok_or_else(|| ViewerError::schema(&records.table, column))?;

        let mut series: Vec<MedicationSeries> = Vec::new();
        for row in &records.rows {
            let description = row.values.get(description_index).cloned().unwrap_or_default();
            let event = MedicationEvent::classify(row.timestamp, row.stop);
            match series.iter_mut().find(|s| s.description == description) {
                Some(existing) => existing.events.push(event),
                None => series.push(MedicationSeries {
                    description,
                    events: vec![event],
                }),
            }
        }

        Ok(Self { series })
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

pub fn build_medication_timeline(
    source: &dyn TabularSource,
    patient_id: &str,
    cutoff: NaiveDateTime,
) -> ViewResult<MedicationTimeline> {
    let filtered = build_filtered(source, Category::Medications, patient_id, cutoff)?;
    MedicationTimeline::from_records(&filtered)
}
