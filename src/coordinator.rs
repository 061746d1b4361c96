use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::model::{Peak, PeakBoundary, Spectrum};
use crate::data::range::RangeSet;
use crate::error::{PipelineError, PipelineResult};
use crate::history::{HistoryEntry, HistoryManager};
use crate::processing::{
    BaselineEngine, PeakAnalysis, PeakBoundaryAnalyzer, PeakDetector, PeakParameters,
    ProcessingParameters, SmoothingEngine,
};
use crate::scheduler::{PreviewExecutor, PreviewRequest};

// ---------------------------------------------------------------------------
// PipelineOutput
// ---------------------------------------------------------------------------

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub spectrum: Arc<Spectrum>,
    pub peaks: Vec<Peak>,
    pub boundaries: Vec<PeakBoundary>,
}

impl From<&HistoryEntry> for PipelineOutput {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            spectrum: Arc::clone(&entry.result),
            peaks: entry.peaks.clone(),
            boundaries: entry.boundaries.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineCoordinator
// ---------------------------------------------------------------------------

/// Runs baseline → smoothing → peaks → boundaries, either as a pure preview
/// or as a commit into the undo history.
///
/// Commits are serialised by `commit_gate`; undo/redo refuse to wait on it
/// and report [`PipelineError::Busy`] instead. Previews never touch either
/// lock beyond reading the current spectrum.
#[derive(Debug)]
pub struct PipelineCoordinator {
    baseline: BaselineEngine,
    smoothing: SmoothingEngine,
    detector: PeakDetector,
    analyzer: PeakBoundaryAnalyzer,
    history: Mutex<HistoryManager>,
    commit_gate: Mutex<()>,
}

impl PipelineCoordinator {
    pub fn new(original: Spectrum) -> Self {
        Self::with_history(HistoryManager::new(Arc::new(original)))
    }

    pub fn with_history_limit(original: Spectrum, limit: usize) -> Self {
        Self::with_history(HistoryManager::with_limit(Arc::new(original), limit))
    }

    fn with_history(history: HistoryManager) -> Self {
        Self {
            baseline: BaselineEngine,
            smoothing: SmoothingEngine,
            detector: PeakDetector,
            analyzer: PeakBoundaryAnalyzer,
            history: Mutex::new(history),
            commit_gate: Mutex::new(()),
        }
    }

    /// Compute the full pipeline over `base` without recording anything.
    pub fn run_preview(
        &self,
        base: &Spectrum,
        ranges: &RangeSet,
        parameters: &ProcessingParameters,
    ) -> PipelineResult<PipelineOutput> {
        self.compute(base, ranges, parameters)
            .inspect_err(PipelineError::report)
    }

    /// Compute against the current committed spectrum and record the result.
    /// A concurrent commit waits for this one to finish.
    pub fn commit(
        &self,
        ranges: RangeSet,
        parameters: ProcessingParameters,
    ) -> PipelineResult<HistoryEntry> {
        let _gate = self.commit_gate.lock();

        let base = self.history.lock().current();
        let output = self
            .compute(&base, &ranges, &parameters)
            .inspect_err(PipelineError::report)?;

        let entry = self.history.lock().commit(
            parameters,
            ranges,
            output.spectrum,
            output.peaks,
            output.boundaries,
        );
        Ok(entry)
    }

    pub fn undo(&self) -> PipelineResult<Arc<Spectrum>> {
        let Some(_gate) = self.commit_gate.try_lock() else {
            let err = PipelineError::Busy;
            err.report();
            return Err(err);
        };
        self.history.lock().undo().inspect_err(PipelineError::report)
    }

    pub fn redo(&self) -> PipelineResult<Arc<Spectrum>> {
        let Some(_gate) = self.commit_gate.try_lock() else {
            let err = PipelineError::Busy;
            err.report();
            return Err(err);
        };
        self.history.lock().redo().inspect_err(PipelineError::report)
    }

    pub fn current(&self) -> Arc<Spectrum> {
        self.history.lock().current()
    }

    /// Output of the entry at the cursor, or the bare undo floor.
    pub fn current_output(&self) -> PipelineOutput {
        let history = self.history.lock();
        match history.current_entry() {
            Some(entry) => PipelineOutput::from(entry),
            None => PipelineOutput {
                spectrum: history.current(),
                peaks: Vec::new(),
                boundaries: Vec::new(),
            },
        }
    }

    pub fn original(&self) -> Arc<Spectrum> {
        self.history.lock().original()
    }

    /// Number of applied (undoable) operations.
    pub fn applied_count(&self) -> usize {
        self.history.lock().applied().len()
    }

    // -- standalone analysis --

    pub fn detect_peaks(&self, spectrum: &Spectrum, parameters: &PeakParameters) -> PipelineResult<Vec<Peak>> {
        self.detector
            .detect(spectrum, parameters)
            .inspect_err(PipelineError::report)
    }

    pub fn compute_boundaries(
        &self,
        peaks: &[Peak],
        spectrum_range: (f64, f64),
    ) -> PipelineResult<Vec<PeakBoundary>> {
        self.analyzer
            .compute_boundaries(peaks, spectrum_range)
            .inspect_err(PipelineError::report)
    }

    pub fn analyze_peaks(&self, spectrum: &Spectrum, boundaries: &[PeakBoundary]) -> Vec<PeakAnalysis> {
        self.analyzer.analyze_all(spectrum, boundaries)
    }

    // -- internals --

    fn compute(
        &self,
        base: &Spectrum,
        ranges: &RangeSet,
        parameters: &ProcessingParameters,
    ) -> PipelineResult<PipelineOutput> {
        parameters.validate()?;
        let Some(spectrum_range) = base.range().filter(|_| base.len() >= 2) else {
            return Err(PipelineError::InsufficientData {
                samples: base.len(),
                required: 2,
            });
        };

        let mut spectrum = base.clone();
        if let Some(method) = &parameters.baseline {
            spectrum = self.baseline.apply(&spectrum, ranges, method)?;
        }
        if let Some(method) = &parameters.smoothing {
            spectrum = self.smoothing.apply(&spectrum, ranges, method)?;
        }

        let mut peaks = Vec::new();
        let mut boundaries = Vec::new();
        if let Some(peak_params) = &parameters.peaks {
            peaks = self.detector.detect(&spectrum, peak_params)?;
            if peaks.is_empty() {
                log::info!("no peaks found, boundary table left empty");
            } else {
                boundaries = self.analyzer.compute_boundaries(&peaks, spectrum_range)?;
            }
        }

        Ok(PipelineOutput {
            spectrum: Arc::new(spectrum),
            peaks,
            boundaries,
        })
    }
}

impl PreviewExecutor for PipelineCoordinator {
    fn execute(&self, request: &PreviewRequest) -> PipelineResult<PipelineOutput> {
        self.run_preview(&request.base, &request.ranges, &request.parameters)
    }
}
