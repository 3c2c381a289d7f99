use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use crate::error::{ViewerError, ViewResult};
use crate::narrative::TextStore;
use crate::temporal::parse_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    #[serde(default = "default_patients_table")]
    pub patients_table: String,
    #[serde(default = "TextStore::anamnesis")]
    pub anamnesis: TextStore,
    #[serde(default = "TextStore::discharge_report")]
    pub discharge: TextStore,
    #[serde(default = "default_demo_patients")]
    pub demo_patients: Vec<DemoPatient>,
}

/// A selectable patient and the cutoff instants offered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoPatient {
    pub id: String,
    pub cutoffs: Vec<String>,
}

fn default_patients_table() -> String {
    "patients".to_string()
}

fn default_demo_patients() -> Vec<DemoPatient> {
    let demo = |id: &str, cutoffs: [&str; 3]| DemoPatient {
        id: id.to_string(),
        cutoffs: cutoffs.iter().map(|c| c.to_string()).collect(),
    };

    vec![
        demo(
            "30a6452c-4297-a1ac-977a-6a23237c7b46",
            ["2015-10-31T11:02:48Z", "2020-10-30T11:02:48Z", "2022-05-01T09:04:48Z"],
        ),
        demo(
            "37c177ea-4398-fb7a-29fa-70eb3d673876",
            ["2017-10-21T23:25:32Z", "2020-04-24T00:34:38Z", "2024-10-03T23:42:53Z"],
        ),
        demo(
            "b05fba34-1719-c0de-ac25-16e65de3d26a",
            ["2016-02-14T06:56:41Z", "2019-08-28T12:04:41Z", "2023-09-24T09:04:41Z"],
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            patients_table: default_patients_table(),
            anamnesis: TextStore::anamnesis(),
            discharge: TextStore::discharge_report(),
            demo_patients: default_demo_patients(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ViewResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ViewResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ViewerError::Validation(
                "Data directory must be specified".to_string()
            ));
        }

        if self.patients_table.trim().is_empty() {
            return Err(ViewerError::Validation(
                "Patients table name must not be empty".to_string()
            ));
        }

        for store in [&self.anamnesis, &self.discharge] {
            self.validate_text_store(store)?;
        }

        self.validate_demo_patients()
    }

    fn validate_text_store(&self, store: &TextStore) -> ViewResult<()> {
        let fields = [
            &store.table,
            &store.patient_column,
            &store.date_column,
            &store.text_column,
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return Err(ViewerError::Validation(
                format!("Text store {:?} has an empty table or column name", store.table)
            ));
        }
        Ok(())
    }

    fn validate_demo_patients(&self) -> ViewResult<()> {
        let mut seen = HashSet::new();

        for patient in &self.demo_patients {
            if !seen.insert(patient.id.as_str()) {
                return Err(ViewerError::Validation(
                    format!("Duplicate demo patient: {}", patient.id)
                ));
            }

            if patient.cutoffs.is_empty() {
                return Err(ViewerError::Validation(
                    format!("Demo patient {} has no cutoff dates", patient.id)
                ));
            }

            if let Some(bad) = patient.cutoffs.iter().find(|c| parse_timestamp(c).is_none()) {
                return Err(ViewerError::Validation(
                    format!("Invalid cutoff {:?} for demo patient {}", bad, patient.id)
                ));
            }
        }

        Ok(())
    }

    pub fn demo_patient(&self, id: &str) -> Option<&DemoPatient> {
        self.demo_patients.iter().find(|patient| patient.id == id)
    }
}
