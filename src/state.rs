use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::coordinator::{PipelineCoordinator, PipelineOutput};
use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::error::{PipelineError, PipelineResult};
use crate::history::HistoryEntry;
use crate::processing::ProcessingParameters;
use crate::scheduler::{PreviewOutcome, PreviewRequest, PreviewScheduler, SchedulerState};

// ---------------------------------------------------------------------------
// Processing session
// ---------------------------------------------------------------------------

/// The state a front end drives, independent of rendering: one raw
/// spectrum, its committed history and the live preview.
pub struct ProcessingSession {
    coordinator: Arc<PipelineCoordinator>,
    scheduler: PreviewScheduler,
    outcomes: Receiver<PreviewOutcome>,

    /// What should be on screen: the last successful preview, or the
    /// committed state after commit/undo/redo.
    pub displayed: PipelineOutput,

    /// Status / error message shown to the user.
    pub status_message: Option<String>,
}

impl ProcessingSession {
    pub fn new(original: Spectrum, history_limit: Option<usize>) -> std::io::Result<Self> {
        let coordinator = Arc::new(match history_limit {
            Some(limit) => PipelineCoordinator::with_history_limit(original, limit),
            None => PipelineCoordinator::new(original),
        });
        let (scheduler, outcomes) = PreviewScheduler::new(Arc::clone(&coordinator))?;
        let displayed = coordinator.current_output();

        Ok(Self {
            coordinator,
            scheduler,
            outcomes,
            displayed,
            status_message: None,
        })
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.coordinator
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Validate and queue a preview against the current committed spectrum.
    /// Returns the generation the result will carry.
    pub fn request_preview(
        &mut self,
        ranges: &[(f64, f64)],
        parameters: ProcessingParameters,
    ) -> PipelineResult<u64> {
        let ranges = self.validated(ranges, &parameters)?;
        let generation = self.scheduler.request(PreviewRequest {
            base: self.coordinator.current(),
            ranges,
            parameters,
        });
        Ok(generation)
    }

    /// Apply every delivered outcome that is still current. Returns `true`
    /// when `displayed` changed. A failed preview keeps the previous display
    /// and sets `status_message`.
    pub fn poll_preview(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.outcomes.try_recv() {
            changed |= self.apply_outcome(outcome);
        }
        changed
    }

    /// Block until the latest requested preview has been delivered (or
    /// `timeout` passes). Returns whether it arrived.
    pub fn wait_for_preview(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let wanted = self.scheduler.latest_generation();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.outcomes.recv_timeout(remaining) {
                Ok(outcome) => {
                    let generation = outcome.generation;
                    self.apply_outcome(outcome);
                    if generation == wanted {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!("preview worker disconnected");
                    return false;
                }
            }
        }
    }

    pub fn commit(
        &mut self,
        ranges: &[(f64, f64)],
        parameters: ProcessingParameters,
    ) -> PipelineResult<HistoryEntry> {
        let ranges = self.validated(ranges, &parameters)?;
        match self.coordinator.commit(ranges, parameters) {
            Ok(entry) => {
                self.displayed = PipelineOutput::from(&entry);
                self.status_message = None;
                Ok(entry)
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    pub fn undo(&mut self) -> PipelineResult<Arc<Spectrum>> {
        let result = self.coordinator.undo();
        self.after_history_move(result)
    }

    pub fn redo(&mut self) -> PipelineResult<Arc<Spectrum>> {
        let result = self.coordinator.redo();
        self.after_history_move(result)
    }

    pub fn current(&self) -> Arc<Spectrum> {
        self.coordinator.current()
    }

    // -- internals --

    fn validated(
        &mut self,
        ranges: &[(f64, f64)],
        parameters: &ProcessingParameters,
    ) -> PipelineResult<RangeSet> {
        let checked = RangeSet::validate(ranges).and_then(|r| parameters.validate().map(|()| r));
        checked.map_err(|e| {
            let err = PipelineError::from(e);
            err.report();
            self.surface(err)
        })
    }

    fn after_history_move(
        &mut self,
        result: PipelineResult<Arc<Spectrum>>,
    ) -> PipelineResult<Arc<Spectrum>> {
        match result {
            Ok(spectrum) => {
                self.displayed = self.coordinator.current_output();
                self.status_message = None;
                Ok(spectrum)
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    fn apply_outcome(&mut self, outcome: PreviewOutcome) -> bool {
        if outcome.generation != self.scheduler.latest_generation() {
            log::debug!("ignoring preview #{} (superseded)", outcome.generation);
            return false;
        }
        match outcome.result {
            Ok(output) => {
                self.displayed = output;
                self.status_message = None;
                true
            }
            Err(e) => {
                self.surface(e);
                false
            }
        }
    }

    /// Record `err` for display. Reporting to the log happens where the
    /// error was raised.
    fn surface(&mut self, err: PipelineError) -> PipelineError {
        self.status_message = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::SmoothingMethod;

    fn session() -> ProcessingSession {
        let x: Vec<f64> = (0..50).map(|i| 1000.0 + i as f64).collect();
        let y = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
        ProcessingSession::new(Spectrum::new(x, y).unwrap(), None).unwrap()
    }

    fn smooth() -> ProcessingParameters {
        ProcessingParameters {
            smoothing: Some(SmoothingMethod::MovingAverage { window_length: 3 }),
            ..ProcessingParameters::default()
        }
    }

    #[test]
    fn overlapping_ranges_are_rejected_before_scheduling() {
        let mut s = session();
        let err = s
            .request_preview(&[(1000.0, 1020.0), (1010.0, 1030.0)], smooth())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(s.status_message.is_some());
        assert_eq!(s.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn preview_updates_display_without_committing() {
        let mut s = session();
        s.request_preview(&[(1010.0, 1030.0)], smooth()).unwrap();
        assert!(s.wait_for_preview(Duration::from_secs(5)));
        assert_ne!(*s.displayed.spectrum, *s.current());
        assert_eq!(s.coordinator().applied_count(), 0);
    }

    #[test]
    fn failed_preview_keeps_previous_display() {
        let mut s = session();
        s.request_preview(&[], smooth()).unwrap();
        assert!(s.wait_for_preview(Duration::from_secs(5)));
        let shown = s.displayed.clone();

        // Two samples cannot hold a window of 3.
        s.request_preview(&[(1000.0, 1001.0)], smooth()).unwrap();
        assert!(s.wait_for_preview(Duration::from_secs(5)));
        assert_eq!(s.displayed, shown);
        assert!(s.status_message.is_some());
    }

    #[test]
    fn undo_at_bound_sets_status() {
        let mut s = session();
        assert_eq!(s.undo().unwrap_err(), PipelineError::NoHistory);
        assert_eq!(s.status_message.as_deref(), Some("nothing to undo"));
    }

    #[test]
    fn commit_then_undo_restores_display() {
        let mut s = session();
        let original = s.current();
        s.commit(&[(1010.0, 1030.0)], smooth()).unwrap();
        assert_ne!(*s.displayed.spectrum, *original);
        s.undo().unwrap();
        assert!(Arc::ptr_eq(&s.displayed.spectrum, &original));
    }
}
