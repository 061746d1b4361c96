use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};

use ftir_pipeline::batch::{BatchProcessor, save_summary};
use ftir_pipeline::config::{ProcessingConfig, load_config, save_config};
use ftir_pipeline::data::loader::load_csv;
use ftir_pipeline::processing::PeakAnalysis;
use ftir_pipeline::{PeakBoundary, PipelineCoordinator};

#[derive(Parser)]
#[command(name = "ftir-pipeline")]
#[command(about = "Range-scoped FTIR smoothing, baseline correction and peak analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process spectrum CSV files and write the results to a directory
    Process {
        /// Processing configuration (JSON); defaults are used when omitted
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(long, short = 'o', default_value = "ftir_output")]
        output: PathBuf,

        /// Input CSV files (wavenumber, intensity)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Detect peaks in one spectrum and print their analysis windows
    Peaks {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        input: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Process {
            config,
            output,
            inputs,
        } => run_process(config.as_deref(), &output, &inputs),
        Command::Peaks { config, input } => run_peaks(config.as_deref(), &input),
        Command::InitConfig { path } => {
            save_config(&path, &ProcessingConfig::default())?;
            println!("Default configuration written to {}", path.display());
            Ok(())
        }
    }
}

fn read_config(path: Option<&Path>) -> Result<ProcessingConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(ProcessingConfig::default()),
    }
}

fn run_process(config: Option<&Path>, output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let config = read_config(config)?;
    let processor = BatchProcessor::new(config);

    let summary = processor.process_files(
        inputs,
        output,
        Some(|current: usize, total: usize, name: &str| {
            println!("[{current}/{total}] {name}");
        }),
    )?;
    let summary_path = save_summary(&summary, output)?;

    println!(
        "Processed {} of {} file(s), {} failed. Summary: {}",
        summary.successful,
        summary.total_files,
        summary.failed,
        summary_path.display()
    );
    for error in &summary.errors {
        println!("  {}: {}", error.file.display(), error.error);
    }
    Ok(())
}

fn run_peaks(config: Option<&Path>, input: &Path) -> Result<()> {
    let mut config = read_config(config)?;
    config.parameters.peaks.get_or_insert_with(Default::default);

    let raw = load_csv(input)?;
    let ranges = config.range_set(&raw)?;
    let coordinator = PipelineCoordinator::new(raw);
    let entry = coordinator
        .commit(ranges, config.parameters)
        .with_context(|| format!("processing {}", input.display()))?;

    if entry.boundaries.is_empty() {
        println!("No peaks found in {}", input.display());
        return Ok(());
    }

    let analyses = coordinator.analyze_peaks(&entry.result, &entry.boundaries);
    println!("{}", boundary_table(&entry.boundaries, &analyses));
    Ok(())
}

fn boundary_table(boundaries: &[PeakBoundary], analyses: &[PeakAnalysis]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "#",
        "Wavenumber",
        "Intensity",
        "Window",
        "Height (corr.)",
        "Area (corr.)",
    ]);

    let number = |v: f64, precision: usize| Cell::new(format!("{v:.precision$}")).set_alignment(CellAlignment::Right);

    for (i, b) in boundaries.iter().enumerate() {
        let analysis = analyses.iter().find(|a| a.wavenumber == b.peak.wavenumber);
        table.add_row(vec![
            Cell::new(i + 1),
            number(b.peak.wavenumber, 1),
            number(b.peak.intensity, 4),
            Cell::new(format!("{:.1} – {:.1}", b.lower_bound, b.upper_bound)),
            analysis.map_or_else(|| Cell::new("-"), |a| number(a.corrected_height, 4)),
            analysis.map_or_else(|| Cell::new("-"), |a| number(a.corrected_area, 3)),
        ]);
    }
    table
}
