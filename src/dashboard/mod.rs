use crate::chart::{self, ChartSpec};
use crate::config::Config;
use crate::error::ViewResult;
use crate::narrative::{self, TextStore};
use crate::patient::{self, PatientInfo};
use crate::schema::Category;
use crate::source::{CsvDirectory, TabularSource};
use crate::temporal::FilteredRecords;
use crate::timeline::{self, AggregatedTimeline};
use crate::view::{self, MedicationTimeline, PerCategoryView};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    Records { view: PerCategoryView },
    Empty { message: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySection {
    pub category: Category,
    pub title: String,
    pub outcome: SectionOutcome,
}

/// Everything shown for one patient as of one cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub patient_id: String,
    pub cutoff: NaiveDateTime,
    pub patient: Option<PatientInfo>,
    pub sections: Vec<CategorySection>,
    pub timeline: AggregatedTimeline,
    pub timeline_chart: ChartSpec,
    pub medications: Option<MedicationTimeline>,
    pub medication_chart: Option<ChartSpec>,
    pub anamnesis: Option<String>,
    pub discharge_report: Option<String>,
}

impl DashboardSnapshot {
    pub fn view(&self, category: Category) -> Option<&PerCategoryView> {
        self.sections
            .iter()
            .find(|section| section.category == category)
            .and_then(|section| match &section.outcome {
                SectionOutcome::Records { view } => Some(view),
                _ => None,
            })
    }
}

pub struct Dashboard {
    config: Config,
    source: Box<dyn TabularSource>,
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        let source = Box::new(CsvDirectory::new(&config.data_dir));
        Self::with_source(config, source)
    }

    pub fn with_source(config: Config, source: Box<dyn TabularSource>) -> Self {
        Self { config, source }
    }

    pub fn snapshot(&self, patient_id: &str, cutoff: NaiveDateTime) -> ViewResult<DashboardSnapshot> {
        info!("Building dashboard for {} as of {}", patient_id, cutoff);

        let patient = patient::basic_info(self.source.as_ref(), &self.config.patients_table, patient_id)?;
        if patient.is_none() {
            warn!("{} is not in the {} table", patient_id, self.config.patients_table);
        }

        let mut sections = Vec::with_capacity(Category::ALL.len());
        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut medications = None;

        for category in Category::ALL {
            let filtered = view::build_filtered(self.source.as_ref(), category, patient_id, cutoff);
            let records = match timeline::isolate_schema_error(category, filtered)? {
                Ok(records) => records,
                Err(skip) => {
                    sections.push(CategorySection {
                        category,
                        title: format!("{} (NA)", category.label()),
                        outcome: SectionOutcome::Unavailable {
                            reason: skip.reason.clone(),
                        },
                    });
                    skipped.push(skip);
                    continue;
                }
            };

            let aggregated = timeline::aggregate_category(category, &records);
            match timeline::isolate_schema_error(category, aggregated)? {
                Ok(category_entries) => entries.extend(category_entries),
                Err(skip) => skipped.push(skip),
            }

            if category == Category::Medications {
                medications = Self::medications(&records)?;
            }

            sections.push(Self::section(category, patient_id, cutoff, &records));
        }

        let timeline = AggregatedTimeline::assemble(entries, skipped);
        let timeline_chart = chart::timeline_chart(&timeline);
        let medication_chart = medications
            .as_ref()
            .filter(|m| !m.is_empty())
            .map(chart::medication_chart);

        let anamnesis = self.lookup(&self.config.anamnesis, patient_id, cutoff)?;
        let discharge_report = self.lookup(&self.config.discharge, patient_id, cutoff)?;

        info!(
            "Dashboard ready: {} timeline entries, anamnesis {}, discharge report {}",
            timeline.len(),
            availability(&anamnesis),
            availability(&discharge_report)
        );

        Ok(DashboardSnapshot {
            patient_id: patient_id.to_string(),
            cutoff,
            patient,
            sections,
            timeline,
            timeline_chart,
            medications,
            medication_chart,
            anamnesis,
            discharge_report,
        })
    }

    fn section(
        category: Category,
        patient_id: &str,
        cutoff: NaiveDateTime,
        records: &FilteredRecords,
    ) -> CategorySection {
        let view = PerCategoryView {
            category,
            patient_id: patient_id.to_string(),
            cutoff,
            records: records.format(),
        };
        let title = view.title();
        let outcome = if view.is_empty() {
            SectionOutcome::Empty { message: view.empty_message() }
        } else {
            SectionOutcome::Records { view }
        };
        CategorySection { category, title, outcome }
    }

    fn medications(records: &FilteredRecords) -> ViewResult<Option<MedicationTimeline>> {
        match MedicationTimeline::from_records(records) {
            Ok(timeline) => {
                debug!("{} distinct medications", timeline.series.len());
                Ok(Some(timeline))
            }
            Err(err) if err.is_schema() => {
                warn!("No medication chart: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn lookup(&self, store: &TextStore, patient_id: &str, cutoff: NaiveDateTime) -> ViewResult<Option<String>> {
        narrative::lookup_text(self.source.as_ref(), store, patient_id, cutoff)
    }
}

fn availability(text: &Option<String>) -> &'static str {
    if text.is_some() {
        "available"
    } else {
        "not available"
    }
}
