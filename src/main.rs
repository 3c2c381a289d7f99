use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use anamnesis_viewer::config::Config;
use anamnesis_viewer::dashboard::Dashboard;
use anamnesis_viewer::error::ViewerError;
use anamnesis_viewer::{output, patient, temporal};

#[derive(Parser)]
#[command(name = "anamnesis-viewer")]
#[command(about = "Patient record views, timelines and precomputed anamnesis as of a cutoff date")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the CSV tables (overrides the configuration)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Patient identifier
    #[arg(short, long)]
    patient: Option<String>,

    /// Cutoff instant, e.g. 2022-05-01T09:04:48Z
    #[arg(long)]
    cutoff: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// List demo patients and their cutoff dates
    #[arg(short, long)]
    list: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("loading configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.validate()?;

    if cli.list {
        list_demo_patients(&config)?;
        return Ok(());
    }

    let patient_id = cli
        .patient
        .ok_or_else(|| ViewerError::Validation("--patient is required unless --list is given".to_string()))?;

    let cutoff = match &cli.cutoff {
        Some(raw) => temporal::parse_cutoff(raw)?,
        None => {
            let demo = config
                .demo_patient(&patient_id)
                .ok_or_else(|| ViewerError::UnknownPatient(patient_id.clone()))?;
            let cutoff = patient::default_cutoff(demo)?;
            info!("No cutoff given, using {}", temporal::format_date_option(cutoff));
            cutoff
        }
    };
    if config.demo_patient(&patient_id).is_none() {
        warn!("{} is not one of the configured demo patients", patient_id);
    }

    info!("Reading tables from {:?}", config.data_dir);
    let dashboard = Dashboard::new(config);
    let snapshot = dashboard
        .snapshot(&patient_id, cutoff)
        .with_context(|| format!("building dashboard for {}", patient_id))?;

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&cli.output)?;

    output::save_results(&snapshot, &cli.output)?;
    output::generate_report(&snapshot, &cli.output)?;
    info!("Results saved to {:?}", cli.output);

    Ok(())
}

fn list_demo_patients(config: &Config) -> anyhow::Result<()> {
    for demo in &config.demo_patients {
        println!("{}", demo.id);
        for option in patient::date_options(demo)? {
            println!("    {}", option.label);
        }
    }
    Ok(())
}
