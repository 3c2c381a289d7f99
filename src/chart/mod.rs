use crate::temporal::format_timestamp;
use crate::timeline::{AggregatedTimeline, DESCRIPTION_SEPARATOR};
use crate::view::{MedicationEvent, MedicationTimeline};
use serde::{Deserialize, Serialize};

/// Qualitative "Set2" palette; indices past the end wrap around.
pub const PALETTE: [&str; 8] = [
    "rgb(102,194,165)",
    "rgb(252,141,98)",
    "rgb(141,160,203)",
    "rgb(231,138,195)",
    "rgb(166,216,84)",
    "rgb(255,217,47)",
    "rgb(229,196,148)",
    "rgb(179,179,179)",
];

const LINE_BREAK: &str = "<br>";

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceMode {
    #[serde(rename = "markers")]
    Markers,
    #[serde(rename = "lines+markers")]
    LinesMarkers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Label(String),
    Row(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub size: u32,
    /// One colour per point.
    pub colors: Vec<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub color: String,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub mode: TraceMode,
    pub x: Vec<String>,
    pub y: Vec<AxisValue>,
    pub marker: Marker,
    pub line: Option<Line>,
    pub hover_text: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub title: String,
    pub tick_values: Option<Vec<usize>>,
    pub tick_labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub height: u32,
    pub traces: Vec<Trace>,
}

impl ChartSpec {
    pub fn point_count(&self) -> usize {
        self.traces.iter().map(|trace| trace.x.len()).sum()
    }
}

/// One square marker per timeline entry, one row per category.
pub fn timeline_chart(timeline: &AggregatedTimeline) -> ChartSpec {
    let categories = timeline.categories();
    let color_of = |category: &str| {
        let index = categories.iter().position(|c| *c == category).unwrap_or(0);
        palette_color(index).to_string()
    };

    let trace = Trace {
        name: "Event".to_string(),
        mode: TraceMode::Markers,
        x: timeline.entries.iter().map(|e| e.compare_date.to_string()).collect(),
        y: timeline
            .entries
            .iter()
            .map(|e| AxisValue::Label(e.category.clone()))
            .collect(),
        marker: Marker {
            size: 15,
            colors: timeline.entries.iter().map(|e| color_of(e.category.as_str())).collect(),
            symbol: Some("square".to_string()),
        },
        line: None,
        hover_text: timeline
            .entries
            .iter()
            .map(|e| e.description.replace(DESCRIPTION_SEPARATOR, LINE_BREAK))
            .collect(),
    };

    ChartSpec {
        title: "Patient Timeline".to_string(),
        x_axis: Axis {
            title: "Date".to_string(),
            ..Axis::default()
        },
        y_axis: Axis {
            title: "Patient Data".to_string(),
            ..Axis::default()
        },
        height: 375,
        traces: vec![trace],
    }
}

/// First word followed by `" ..."` for multi-word descriptions.
pub fn shorten_label(description: &str) -> String {
    let mut words = description.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(_)) => format!("{} ...", first),
        _ => description.to_string(),
    }
}

/// One row per medicine; points for single administrations, bars for courses.
pub fn medication_chart(medications: &MedicationTimeline) -> ChartSpec {
    let mut traces = Vec::new();

    for (row, series) in medications.series.iter().enumerate() {
        let color = palette_color(row).to_string();

        for event in &series.events {
            let trace = match *event {
                MedicationEvent::Point { at } => {
                    let at = format_timestamp(at);
                    Trace {
                        name: series.description.clone(),
                        mode: TraceMode::Markers,
                        hover_text: vec![format!("{}{}Date: {}", series.description, LINE_BREAK, at)],
                        x: vec![at],
                        y: vec![AxisValue::Row(row)],
                        marker: Marker {
                            size: 10,
                            colors: vec![color.clone()],
                            symbol: None,
                        },
                        line: None,
                    }
                }
                MedicationEvent::Interval { start, stop } => {
                    let (start, stop) = (format_timestamp(start), format_timestamp(stop));
                    Trace {
                        name: series.description.clone(),
                        mode: TraceMode::LinesMarkers,
                        hover_text: vec![format!(
                            "{desc}{br}Start: {start}{br}Stop: {stop}",
                            desc = series.description,
                            br = LINE_BREAK,
                            start = start,
                            stop = stop
                        )],
                        x: vec![start, stop],
                        y: vec![AxisValue::Row(row), AxisValue::Row(row)],
                        marker: Marker {
                            size: 2,
                            colors: vec![color.clone()],
                            symbol: Some("line-ew".to_string()),
                        },
                        line: Some(Line {
                            color: color.clone(),
                            width: 20,
                        }),
                    }
                }
            };
            traces.push(trace);
        }
    }

    ChartSpec {
        title: "Medications Timeline".to_string(),
        x_axis: Axis {
            title: "Date".to_string(),
            ..Axis::default()
        },
        y_axis: Axis {
            title: "Medicine".to_string(),
            tick_values: Some((0..medications.series.len()).collect()),
            tick_labels: Some(
                medications
                    .series
                    .iter()
                    .map(|s| shorten_label(&s.description))
                    .collect(),
            ),
        },
        height: 400,
        traces,
    }
}
