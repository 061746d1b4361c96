use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use ftir_pipeline::{
    PipelineOutput, PipelineResult, PreviewExecutor, PreviewRequest, PreviewScheduler,
    ProcessingParameters, RangeSet, SchedulerState, Spectrum,
};

const WAIT: Duration = Duration::from_secs(5);

/// Records which request it ran, announces the start, then blocks until the
/// test opens the gate once.
struct Gated {
    calls: Mutex<Vec<f64>>,
    started: Sender<()>,
    gate: Receiver<()>,
}

impl PreviewExecutor for Gated {
    fn execute(&self, request: &PreviewRequest) -> PipelineResult<PipelineOutput> {
        self.calls.lock().push(request.base.intensities()[0]);
        let _ = self.started.send(());
        let _ = self.gate.recv_timeout(WAIT);
        Ok(PipelineOutput {
            spectrum: Arc::clone(&request.base),
            peaks: Vec::new(),
            boundaries: Vec::new(),
        })
    }
}

fn labelled(label: f64) -> PreviewRequest {
    PreviewRequest {
        base: Arc::new(Spectrum::new(vec![1.0, 2.0, 3.0], vec![label; 3]).unwrap()),
        ranges: RangeSet::default(),
        parameters: ProcessingParameters::default(),
    }
}

#[test]
fn rapid_requests_compute_only_first_and_last() {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
    let executor = Arc::new(Gated {
        calls: Mutex::new(Vec::new()),
        started: started_tx,
        gate: gate_rx,
    });
    let (scheduler, outcomes) = PreviewScheduler::new(Arc::clone(&executor)).unwrap();

    let a = scheduler.request(labelled(1.0));
    started_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Computing);

    let b = scheduler.request(labelled(2.0));
    let c = scheduler.request(labelled(3.0));
    assert_eq!(scheduler.state(), SchedulerState::ComputingStale);
    assert!(a < b && b < c);

    // Release A, then C.
    gate_tx.send(()).unwrap();
    started_rx.recv_timeout(WAIT).unwrap();
    gate_tx.send(()).unwrap();

    let outcome = outcomes.recv_timeout(WAIT).unwrap();
    assert_eq!(outcome.generation, c);
    assert_eq!(outcome.result.unwrap().spectrum.intensities()[0], 3.0);

    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(*executor.calls.lock(), vec![1.0, 3.0]);
    // A finished stale and was never delivered.
    assert!(outcomes.try_recv().is_err());
}

#[test]
fn idle_request_is_delivered_with_its_generation() {
    let (started_tx, _started_rx) = crossbeam_channel::unbounded();
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
    gate_tx.send(()).unwrap();
    let executor = Arc::new(Gated {
        calls: Mutex::new(Vec::new()),
        started: started_tx,
        gate: gate_rx,
    });
    let (scheduler, outcomes) = PreviewScheduler::new(executor).unwrap();

    let generation = scheduler.request(labelled(7.0));
    let outcome = outcomes.recv_timeout(WAIT).unwrap();
    assert_eq!(outcome.generation, generation);
    assert_eq!(scheduler.latest_generation(), generation);
}
