use std::path::Path;

use anyhow::{Context, Result, bail};

use super::model::{PeakBoundary, Spectrum};
use crate::processing::PeakAnalysis;

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row, then one sample per row. The first column is the
/// wavenumber, the second the intensity; extra columns are ignored.
/// Descending axes (4000 → 400 cm⁻¹) are flipped to ascending order.
pub fn load_csv(path: &Path) -> Result<Spectrum> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;

    let headers = reader.headers().context("reading CSV headers")?;
    if headers.len() < 2 {
        bail!(
            "{}: expected at least 2 columns (wavenumber, intensity), found {}",
            path.display(),
            headers.len()
        );
    }

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        x.push(parse_float(record.get(0), row_no, "wavenumber")?);
        y.push(parse_float(record.get(1), row_no, "intensity")?);
    }

    if x.len() < 2 {
        bail!("{}: need at least 2 samples, found {}", path.display(), x.len());
    }

    let spectrum = Spectrum::from_unordered(x, y)
        .with_context(|| format!("invalid spectrum in {}", path.display()))?;
    log::info!("loaded {} samples from {}", spectrum.len(), path.display());
    Ok(spectrum)
}

fn parse_float(field: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = field.unwrap_or("");
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// Write `wavenumber,raw,processed` rows. Both spectra must share an axis.
pub fn export_processed(path: &Path, raw: &Spectrum, processed: &Spectrum) -> Result<()> {
    if raw.wavenumbers() != processed.wavenumbers() {
        bail!("raw and processed spectra do not share a wavenumber axis");
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["wavenumber", "raw", "processed"])?;
    for ((x, r), p) in raw
        .wavenumbers()
        .iter()
        .zip(raw.intensities())
        .zip(processed.intensities())
    {
        writer.write_record([x.to_string(), r.to_string(), p.to_string()])?;
    }
    writer.flush().context("flushing processed CSV")?;
    Ok(())
}

/// One row per peak window. `analyses` may be shorter than `boundaries`
/// when some windows could not be analysed; those rows leave the
/// measurement columns blank.
pub fn export_peaks(path: &Path, boundaries: &[PeakBoundary], analyses: &[PeakAnalysis]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "peak",
        "wavenumber",
        "intensity",
        "lower_bound",
        "upper_bound",
        "uncorrected_height",
        "corrected_height",
        "uncorrected_area",
        "corrected_area",
    ])?;

    for (i, b) in boundaries.iter().enumerate() {
        let analysis = analyses.iter().find(|a| a.wavenumber == b.peak.wavenumber);
        let measured = |f: fn(&PeakAnalysis) -> f64| analysis.map(|a| f(a).to_string()).unwrap_or_default();
        writer.write_record([
            (i + 1).to_string(),
            b.peak.wavenumber.to_string(),
            b.peak.intensity.to_string(),
            b.lower_bound.to_string(),
            b.upper_bound.to_string(),
            measured(|a| a.uncorrected_height),
            measured(|a| a.corrected_height),
            measured(|a| a.uncorrected_area),
            measured(|a| a.corrected_area),
        ])?;
    }
    writer.flush().context("flushing peak CSV")?;
    Ok(())
}
