use crate::error::{ViewResult, ViewerError};
use crate::schema::{Category, PATIENT_COLUMN};
use log::debug;
use std::path::{Path, PathBuf};

/// Rows of one backing table, cells kept verbatim. An empty cell is a null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub table: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordSet {
    pub fn new(table: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            table: table.to_string(),
            headers,
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, name: &str) -> ViewResult<usize> {
        self.column_index(name)
            .ok_or_else(|| ViewerError::schema(&self.table, name))
    }

    /// Keeps only the rows whose `column` equals `value`.
    pub fn retain_matching(mut self, column: &str, value: &str) -> ViewResult<Self> {
        let index = self.require_column(column)?;
        self.rows
            .retain(|row| row.get(index).map(String::as_str) == Some(value));
        Ok(self)
    }
}

/// Read-only access to named tables.
pub trait TabularSource {
    fn read_table(&self, table: &str) -> ViewResult<RecordSet>;
}

/// A directory holding one `<table>.csv` file per table.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.csv", table))
    }
}

impl TabularSource for CsvDirectory {
    fn read_table(&self, table: &str) -> ViewResult<RecordSet> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(ViewerError::NotFound(path.display().to_string()));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!("Read {} rows from {:?}", rows.len(), path);
        Ok(RecordSet::new(table, headers, rows))
    }
}

/// Loads one category's records for a single patient.
pub fn load(source: &dyn TabularSource, category: Category, patient_id: &str) -> ViewResult<RecordSet> {
    load_matching(source, category.table_name(), PATIENT_COLUMN, patient_id)
}

/// Loads the rows of `table` whose `column` equals `value`.
pub fn load_matching(
    source: &dyn TabularSource,
    table: &str,
    column: &str,
    value: &str,
) -> ViewResult<RecordSet> {
    source.read_table(table)?.retain_matching(column, value)
}


#[cfg(test)]
mod tests {
    use super::*;

    const CONDITIONS: &str = "START,STOP,PATIENT,ENCOUNTER,CODE,DESCRIPTION\n\
        2021-06-01,,P1,E1,386661006,Fever (finding)\n\
        2021-07-01,,P2,E2,444814009,Viral sinusitis (disorder)\n\
        2022-06-01,,P1,E3,6142004,Flu\n";

    #[test]
    fn test_load_filters_by_patient() {
        let dir = fixtures::data_dir(&[("conditions", CONDITIONS)]);
        let source = CsvDirectory::new(dir.path());

        let records = load(&source, Category::Conditions, "P1").unwrap();
        assert_eq!(records.rows.len(), 2);
        assert_eq!(records.table, "conditions");
        let desc = records.column_index("DESCRIPTION").unwrap();
        assert_eq!(records.rows[0][desc], "Fever (finding)");
        assert_eq!(records.rows[1][desc], "Flu");
    }

    #[test]
    fn test_unknown_patient_is_empty() {
        let dir = fixtures::data_dir(&[("conditions", CONDITIONS)]);
        let source = CsvDirectory::new(dir.path());

        let records = load(&source, Category::Conditions, "nobody").unwrap();
        assert!(records.rows.is_empty());
        assert_eq!(records.headers.len(), 6);
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let dir = fixtures::data_dir(&[]);
        let source = CsvDirectory::new(dir.path());

        let err = load(&source, Category::Allergies, "P1").unwrap_err();
        assert!(matches!(err, ViewerError::NotFound(_)));
    }

    #[test]
    fn test_missing_patient_column_is_schema_error() {
        let dir = fixtures::data_dir(&[("allergies", "START,DESCRIPTION\n2020-01-01,Peanuts\n")]);
        let source = CsvDirectory::new(dir.path());

        let err = load(&source, Category::Allergies, "P1").unwrap_err();
        assert!(err.is_schema());
    }
}
