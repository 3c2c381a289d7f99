//! Cutoff-bounded views over a patient's clinical tables.
//!
//! Each category table (procedures, medications, ...) is loaded for one
//! patient, filtered to the records at or before a cutoff instant and
//! sorted chronologically. The same records feed a merged cross-category
//! timeline and the chart specifications built from it.

pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod narrative;
pub mod output;
pub mod patient;
pub mod schema;
pub mod source;
pub mod temporal;
pub mod timeline;
pub mod view;
