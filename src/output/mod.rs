use crate::dashboard::{DashboardSnapshot, SectionOutcome};
use crate::error::ViewResult;
use crate::temporal::{format_date, format_date_option};
use crate::timeline::AggregatedTimeline;
use crate::view::PerCategoryView;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use log::info;

pub fn save_results<P: AsRef<Path>>(snapshot: &DashboardSnapshot, output_dir: P) -> ViewResult<()> {
    let output_path = output_dir.as_ref();

    // One table per category with records
    for section in &snapshot.sections {
        if let SectionOutcome::Records { view } = &section.outcome {
            save_view(view, &output_path.join(format!("{}.csv", section.category)))?;
        }
    }

    save_timeline(&snapshot.timeline, &output_path.join("timeline.csv"))?;

    save_json(&snapshot.timeline_chart, &output_path.join("timeline_chart.json"))?;
    if let Some(chart) = &snapshot.medication_chart {
        save_json(chart, &output_path.join("medications_chart.json"))?;
    }

    save_json(snapshot, &output_path.join("snapshot.json"))?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn save_view<P: AsRef<Path>>(view: &PerCategoryView, path: P) -> ViewResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["#".to_string()];
    header.extend(view.records.headers.iter().cloned());
    writer.write_record(&header)?;

    for row in &view.records.rows {
        let mut record = vec![row.rank.to_string()];
        record.extend(row.values.iter().cloned());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn save_timeline<P: AsRef<Path>>(timeline: &AggregatedTimeline, path: P) -> ViewResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["CATEGORY", "DATE", "DESCRIPTION"])?;

    for entry in &timeline.entries {
        let date = entry.compare_date.to_string();
        writer.write_record([entry.category.as_str(), date.as_str(), entry.description.as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_json<T: Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> ViewResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Renders the dashboard as a Markdown document.
pub fn render_report(snapshot: &DashboardSnapshot) -> String {
    let until = format_date(snapshot.cutoff);

    let basic_info = match &snapshot.patient {
        Some(info) => info
            .fields
            .iter()
            .map(|(name, value)| format!("- **{}:** *{}*\n", name, value))
            .collect::<String>(),
        None => "Patient is not listed in the patient table.\n".to_string(),
    };

    let timeline = if snapshot.timeline.is_empty() {
        format!("No events until {}.\n", until)
    } else {
        snapshot
            .timeline
            .entries
            .iter()
            .map(|entry| format!("- {} | {} | {}\n", entry.compare_date, entry.category, entry.description))
            .collect()
    };

    let mut report = format!(
        r#"# Anamnesis Report

- **Patient**: {}
- **Until**: {}

## Patient Basic Information

{}
## Patient Timeline

{}"#,
        snapshot.patient_id,
        format_date_option(snapshot.cutoff),
        basic_info,
        timeline
    );

    for section in &snapshot.sections {
        let body = match &section.outcome {
            SectionOutcome::Records { view } => render_table(view),
            SectionOutcome::Empty { message } => format!("{}\n", message),
            SectionOutcome::Unavailable { reason } => format!("Data unavailable: {}\n", reason),
        };
        report.push_str(&format!("\n## {}\n\n{}", section.title, body));
    }

    report.push_str(&format!(
        r#"
## Discharge report

{}

## Generated Anamnesis

{}
"#,
        snapshot
            .discharge_report
            .as_deref()
            .unwrap_or("There is no available discharge report."),
        snapshot.anamnesis.as_deref().unwrap_or("There is no available anamnesis.")
    ));

    report
}

fn render_table(view: &PerCategoryView) -> String {
    let mut table = format!(
        "| # | {} |\n|---|{}\n",
        view.records.headers.join(" | "),
        "---|".repeat(view.records.headers.len())
    );
    for row in &view.records.rows {
        let cells: Vec<String> = row.values.iter().map(|v| v.replace('|', "\\|")).collect();
        table.push_str(&format!("| {} | {} |\n", row.rank, cells.join(" | ")));
    }
    table
}

/// Writes the Markdown report next to the other results.
pub fn generate_report<P: AsRef<Path>>(snapshot: &DashboardSnapshot, output_dir: P) -> ViewResult<()> {
    let report_path = output_dir.as_ref().join("dashboard_report.md");
    std::fs::write(report_path, render_report(snapshot))?;
    Ok(())
}
