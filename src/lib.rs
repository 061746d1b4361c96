//! Incremental FTIR spectral processing.
//!
//! Range-scoped baseline correction and smoothing, peak detection with
//! midpoint analysis windows, a single-flight preview scheduler and a linear
//! undo history of committed results.

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod history;
pub mod processing;
pub mod scheduler;
pub mod state;

pub use coordinator::{PipelineCoordinator, PipelineOutput};
pub use data::model::{Peak, PeakBoundary, Sample, Spectrum};
pub use data::range::{Range, RangeSet};
pub use error::{PipelineError, PipelineResult, Stage, ValidationError};
pub use history::{HistoryEntry, HistoryManager};
pub use processing::{
    BaselineMethod, PeakDirection, PeakParameters, ProcessingParameters, SmoothingMethod,
};
pub use scheduler::{PreviewExecutor, PreviewOutcome, PreviewRequest, PreviewScheduler, SchedulerState};
pub use state::ProcessingSession;
