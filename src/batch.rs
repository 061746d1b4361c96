use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::ProcessingConfig;
use crate::coordinator::PipelineCoordinator;
use crate::data::loader::{export_peaks, export_processed, load_csv};

pub const SUMMARY_FILE_NAME: &str = "batch_summary.json";

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// What one successfully processed file produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub input_file: PathBuf,
    pub filename: String,
    pub data_points: usize,
    pub processing_steps: Vec<String>,
    pub peaks_found: usize,
    pub output_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub timestamp: DateTime<Local>,
    pub results: Vec<FileResult>,
    pub errors: Vec<FileError>,
}

// ---------------------------------------------------------------------------
// BatchProcessor
// ---------------------------------------------------------------------------

/// Runs one [`ProcessingConfig`] over many spectrum files.
pub struct BatchProcessor {
    config: ProcessingConfig,
}

impl BatchProcessor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Process every file into `output_dir`. A failing file is recorded in
    /// the summary and does not stop the batch. `progress` receives
    /// `(current, total, file_name)` before each file.
    pub fn process_files<F>(
        &self,
        paths: &[PathBuf],
        output_dir: &Path,
        mut progress: Option<F>,
    ) -> Result<BatchSummary>
    where
        F: FnMut(usize, usize, &str),
    {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;

        let total = paths.len();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (i, path) in paths.iter().enumerate() {
            let name = file_name(path);
            if let Some(cb) = progress.as_mut() {
                cb(i + 1, total, &name);
            }

            match self.process_file(path, output_dir) {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::warn!("{}: {e:#}", path.display());
                    errors.push(FileError {
                        file: path.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        log::info!(
            "batch finished: {} of {total} file(s) processed",
            results.len()
        );
        Ok(BatchSummary {
            total_files: total,
            successful: results.len(),
            failed: errors.len(),
            timestamp: Local::now(),
            results,
            errors,
        })
    }

    /// One commit through a fresh coordinator, then the CSV exports.
    pub fn process_file(&self, path: &Path, output_dir: &Path) -> Result<FileResult> {
        let raw = load_csv(path)?;
        let data_points = raw.len();
        let ranges = self.config.range_set(&raw)?;

        let coordinator = PipelineCoordinator::new(raw);
        let entry = coordinator
            .commit(ranges, self.config.parameters.clone())
            .with_context(|| format!("processing {}", path.display()))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "spectrum".to_string());

        let mut output_files = Vec::new();
        let processed_path = output_dir.join(format!("{stem}_processed.csv"));
        export_processed(&processed_path, &coordinator.original(), &entry.result)?;
        output_files.push(processed_path);

        if !entry.boundaries.is_empty() {
            let analyses = coordinator.analyze_peaks(&entry.result, &entry.boundaries);
            let peaks_path = output_dir.join(format!("{stem}_peaks.csv"));
            export_peaks(&peaks_path, &entry.boundaries, &analyses)?;
            output_files.push(peaks_path);
        }

        let parameters = &self.config.parameters;
        let processing_steps = [
            parameters.baseline.as_ref().map(|_| "baseline"),
            parameters.smoothing.as_ref().map(|_| "smoothing"),
            parameters.peaks.as_ref().map(|_| "peak_analysis"),
        ]
        .into_iter()
        .flatten()
        .map(String::from)
        .collect();

        Ok(FileResult {
            input_file: path.to_path_buf(),
            filename: file_name(path),
            data_points,
            processing_steps,
            peaks_found: entry.peaks.len(),
            output_files,
        })
    }
}

/// Write `summary` as pretty JSON into `output_dir`.
pub fn save_summary(summary: &BatchSummary, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(SUMMARY_FILE_NAME);
    let text = serde_json::to_string_pretty(summary).context("serialising batch summary")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ftir-batch-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_spectrum(path: &Path) {
        let mut text = String::from("wavenumber,absorbance\n");
        for i in 0..120 {
            let x = 1000.0 + 2.0 * i as f64;
            let y = (-(x - 1100.0f64).powi(2) / 50.0).exp() + 0.6 * (-(x - 1180.0f64).powi(2) / 50.0).exp();
            text.push_str(&format!("{x},{y}\n"));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn bad_file_is_recorded_and_batch_continues() {
        let dir = temp_dir("mixed");
        let good = dir.join("good.csv");
        let bad = dir.join("bad.csv");
        write_spectrum(&good);
        std::fs::write(&bad, "only_one_column\n1\n2\n").unwrap();

        let out = dir.join("out");
        let mut seen = Vec::new();
        let summary = BatchProcessor::new(ProcessingConfig::default())
            .process_files(
                &[good, bad.clone()],
                &out,
                Some(|current: usize, total: usize, name: &str| seen.push((current, total, name.to_string()))),
            )
            .unwrap();

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].file, bad);
        assert_eq!(seen, vec![(1, 2, "good.csv".to_string()), (2, 2, "bad.csv".to_string())]);

        let result = &summary.results[0];
        assert_eq!(result.data_points, 120);
        assert_eq!(result.peaks_found, 2);
        assert!(out.join("good_processed.csv").exists());
        assert!(out.join("good_peaks.csv").exists());

        let saved = save_summary(&summary, &out).unwrap();
        let text = std::fs::read_to_string(saved).unwrap();
        assert!(text.contains("\"successful\": 1"));
    }
}
