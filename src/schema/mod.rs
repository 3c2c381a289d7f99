use crate::error::{ViewResult, ViewerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PATIENT_COLUMN: &str = "PATIENT";
pub const START_COLUMN: &str = "START";
pub const DATE_COLUMN: &str = "DATE";
pub const STOP_COLUMN: &str = "STOP";

/// Clinical data domains, in the order the dashboard lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Procedures,
    Observations,
    Medications,
    Immunizations,
    ImagingStudies,
    Encounters,
    Conditions,
    Careplans,
    Allergies,
}

/// Static description of one category's backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySchema {
    pub table: &'static str,
    pub description_column: &'static str,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Procedures,
        Category::Observations,
        Category::Medications,
        Category::Immunizations,
        Category::ImagingStudies,
        Category::Encounters,
        Category::Conditions,
        Category::Careplans,
        Category::Allergies,
    ];

    pub fn schema(self) -> CategorySchema {
        match self {
            Category::Procedures => CategorySchema::plain("procedures"),
            Category::Observations => CategorySchema::plain("observations"),
            Category::Medications => CategorySchema::plain("medications"),
            Category::Immunizations => CategorySchema::plain("immunizations"),
            Category::ImagingStudies => CategorySchema {
                table: "imaging_studies",
                description_column: "BODYSITE_DESCRIPTION",
            },
            Category::Encounters => CategorySchema::plain("encounters"),
            Category::Conditions => CategorySchema::plain("conditions"),
            Category::Careplans => CategorySchema::plain("careplans"),
            Category::Allergies => CategorySchema::plain("allergies"),
        }
    }

    pub fn table_name(self) -> &'static str {
        self.schema().table
    }

    /// Human-readable label: underscores become spaces, first letter upper-cased.
    pub fn label(self) -> String {
        let spaced = self.table_name().replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl CategorySchema {
    const fn plain(table: &'static str) -> Self {
        Self {
            table,
            description_column: "DESCRIPTION",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Category {
    type Err = ViewerError;

    fn from_str(s: &str) -> ViewResult<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.table_name() == s)
            .ok_or_else(|| ViewerError::UnknownCategory(s.to_string()))
    }
}
