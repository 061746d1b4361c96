use std::fmt;

use log::Level;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Stage – which step of the pipeline produced an error
// ---------------------------------------------------------------------------

/// A step of the processing chain, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Baseline,
    Smoothing,
    PeakAnalysis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Baseline => "baseline correction",
            Stage::Smoothing => "smoothing",
            Stage::PeakAnalysis => "peak analysis",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Validation errors – rejected before any computation runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("range #{index} [{low}, {high}] is invalid: low bound must be finite and below the high bound")]
    InvalidRange { index: usize, low: f64, high: f64 },

    #[error("range [{first_low}, {first_high}] overlaps range [{second_low}, {second_high}]")]
    OverlappingRange {
        first_low: f64,
        first_high: f64,
        second_low: f64,
        second_high: f64,
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("malformed spectrum: {0}")]
    MalformedSpectrum(String),

    #[error("peaks must be ordered by ascending wavenumber (peak #{index} at {wavenumber} is out of order)")]
    UnorderedPeaks { index: usize, wavenumber: f64 },
}

impl ValidationError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineError – the full taxonomy surfaced to callers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("spectrum has {samples} samples, at least {required} are required")]
    InsufficientData { samples: usize, required: usize },

    #[error("{stage}: range [{low}, {high}] holds {samples} samples, at least {required} are required")]
    InsufficientSamples {
        stage: Stage,
        low: f64,
        high: f64,
        samples: usize,
        required: usize,
    },

    #[error("peak boundaries requested for an empty peak set")]
    EmptyPeakSet,

    #[error("{stage} failed: {message}")]
    StageExecution { stage: Stage, message: String },

    #[error("nothing to undo")]
    NoHistory,

    #[error("nothing to redo")]
    NoRedo,

    #[error("a commit is in progress, try again once it completes")]
    Busy,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub(crate) fn stage(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::StageExecution {
            stage,
            message: message.into(),
        }
    }

    /// Log level this error is reported at. Undo/redo at a history bound is
    /// an expected outcome and stays at `info`.
    pub fn level(&self) -> Level {
        match self {
            PipelineError::NoHistory | PipelineError::NoRedo => Level::Info,
            PipelineError::Validation(_)
            | PipelineError::InsufficientData { .. }
            | PipelineError::InsufficientSamples { .. }
            | PipelineError::EmptyPeakSet
            | PipelineError::Busy => Level::Warn,
            PipelineError::StageExecution { .. } => Level::Error,
        }
    }

    /// Send this error to the logging sink.
    pub fn report(&self) {
        log::log!(self.level(), "{self}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert_and_keep_their_message() {
        let err: PipelineError = ValidationError::InvalidRange {
            index: 0,
            low: 1200.0,
            high: 1000.0,
        }
        .into();
        assert!(err.to_string().contains("[1200, 1000]"));
        assert_eq!(err.level(), Level::Warn);
    }

    #[test]
    fn undo_redo_bounds_log_at_info() {
        assert_eq!(PipelineError::NoHistory.level(), Level::Info);
        assert_eq!(PipelineError::NoRedo.level(), Level::Info);
        assert_eq!(PipelineError::EmptyPeakSet.level(), Level::Warn);
    }

    #[test]
    fn stage_errors_name_the_stage() {
        let err = PipelineError::stage(Stage::Baseline, "singular system");
        assert_eq!(err.to_string(), "baseline correction failed: singular system");
        assert_eq!(err.level(), Level::Error);
    }
}
