use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::processing::{PeakParameters, ProcessingParameters, SmoothingMethod};

pub const CONFIG_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// ProcessingConfig
// ---------------------------------------------------------------------------

/// A reusable processing recipe: which ranges, which stages, how much
/// history to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// `(low, high)` pairs. Empty means the whole spectrum.
    pub ranges: Vec<(f64, f64)>,
    pub parameters: ProcessingParameters,
    pub history_limit: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ranges: Vec::new(),
            parameters: ProcessingParameters {
                baseline: None,
                smoothing: Some(SmoothingMethod::SavitzkyGolay {
                    window_length: 11,
                    polyorder: 3,
                }),
                peaks: Some(PeakParameters {
                    threshold: Some(0.1),
                    min_distance: 10,
                    ..PeakParameters::default()
                }),
            },
            history_limit: Some(10),
        }
    }
}

impl ProcessingConfig {
    /// The configured ranges for `spectrum`; empty expands to the full axis.
    pub fn range_set(&self, spectrum: &Spectrum) -> Result<RangeSet> {
        if self.ranges.is_empty() {
            return Ok(RangeSet::full(spectrum));
        }
        RangeSet::validate(&self.ranges).context("invalid ranges in configuration")
    }

    pub fn validate(&self) -> Result<()> {
        RangeSet::validate(&self.ranges).context("invalid ranges in configuration")?;
        self.parameters
            .validate()
            .context("invalid parameters in configuration")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// On-disk envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    version: String,
    created_at: DateTime<Local>,
    config: ProcessingConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnyConfigFile {
    Versioned(ConfigFile),
    Legacy(ProcessingConfig),
}

pub fn save_config(path: &Path, config: &ProcessingConfig) -> Result<()> {
    let file = ConfigFile {
        version: CONFIG_VERSION.to_string(),
        created_at: Local::now(),
        config: config.clone(),
    };
    let text = serde_json::to_string_pretty(&file).context("serialising configuration")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    log::info!("configuration saved to {}", path.display());
    Ok(())
}

/// Read a configuration written by [`save_config`], or a bare
/// `ProcessingConfig` object from older files.
pub fn load_config(path: &Path) -> Result<ProcessingConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let parsed: AnyConfigFile = serde_json::from_str(&text).context("parsing configuration JSON")?;

    let config = match parsed {
        AnyConfigFile::Versioned(file) => {
            if file.version != CONFIG_VERSION {
                bail!(
                    "{}: unsupported configuration version {} (expected {CONFIG_VERSION})",
                    path.display(),
                    file.version
                );
            }
            log::debug!("configuration created {}", file.created_at.to_rfc3339());
            file.config
        }
        AnyConfigFile::Legacy(config) => {
            log::warn!("{} has no version envelope, reading as legacy", path.display());
            config
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::BaselineMethod;

    fn temp_file(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ftir-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn save_then_load_keeps_every_field() {
        let path = temp_file("full.json");
        let config = ProcessingConfig {
            ranges: vec![(1000.0, 1200.0), (1500.0, 1700.0)],
            parameters: ProcessingParameters {
                baseline: Some(BaselineMethod::Rubberband),
                ..ProcessingConfig::default().parameters
            },
            history_limit: None,
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"version\": \"1.0\""));
        assert!(text.contains("created_at"));
    }

    #[test]
    fn legacy_bare_config_is_accepted() {
        let path = temp_file("legacy.json");
        std::fs::write(
            &path,
            r#"{ "ranges": [[400.0, 1800.0]],
                 "parameters": { "smoothing": { "method": "median", "window_length": 5 } } }"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.ranges, vec![(400.0, 1800.0)]);
        assert_eq!(
            config.parameters.smoothing,
            Some(SmoothingMethod::Median { window_length: 5 })
        );
        assert!(config.parameters.peaks.is_none());
    }

    #[test]
    fn overlapping_ranges_fail_to_load() {
        let path = temp_file("overlap.json");
        let config = ProcessingConfig {
            ranges: vec![(1000.0, 1200.0), (1150.0, 1300.0)],
            ..ProcessingConfig::default()
        };
        save_config(&path, &config).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("overlaps"));
    }

    #[test]
    fn empty_ranges_cover_the_spectrum() {
        let sp = Spectrum::new(vec![1.0, 2.0, 3.0], vec![0.0; 3]).unwrap();
        let set = ProcessingConfig::default().range_set(&sp).unwrap();
        assert_eq!(set, RangeSet::full(&sp));
    }
}
