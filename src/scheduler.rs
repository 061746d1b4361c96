//! Single-flight preview scheduling.
//!
//! ```text
//!   Idle ──request──▶ Computing ──request──▶ ComputingStale
//!    ▲                 │    ▲                      │
//!    └── run done, ────┘    └── run done, newer ───┘
//!        nothing pending        request pending
//! ```
//!
//! One worker thread owns all computation. Only the newest pending request
//! is kept, so intermediate parameter states during a drag are never
//! computed. Each request is tagged with a generation; a finished run whose
//! generation is no longer the latest is dropped instead of delivered.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::coordinator::PipelineOutput;
use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::error::PipelineResult;
use crate::processing::ProcessingParameters;

// ---------------------------------------------------------------------------
// Requests, outcomes and the executor seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub base: Arc<Spectrum>,
    pub ranges: RangeSet,
    pub parameters: ProcessingParameters,
}

impl PreviewRequest {
    /// Same base instance, same ranges and parameters by value. Processing
    /// is deterministic, so such a request yields the same output.
    pub fn same_work(&self, other: &PreviewRequest) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
            && self.ranges == other.ranges
            && self.parameters == other.parameters
    }
}

/// A delivered preview result, tagged with the generation it was requested
/// under.
#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub generation: u64,
    pub result: PipelineResult<PipelineOutput>,
}

/// Whatever actually runs a preview. Implemented by the pipeline
/// coordinator; tests substitute their own.
pub trait PreviewExecutor: Send + Sync + 'static {
    fn execute(&self, request: &PreviewRequest) -> PipelineResult<PipelineOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Computing,
    /// A run is in flight and a newer request is waiting behind it.
    ComputingStale,
}

// ---------------------------------------------------------------------------
// PreviewScheduler
// ---------------------------------------------------------------------------

struct Inner {
    state: SchedulerState,
    pending: Option<(u64, PreviewRequest)>,
    generation: u64,
    shutdown: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    idle: Condvar,
}

pub struct PreviewScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewScheduler {
    /// Start the worker. Outcomes arrive on the returned receiver.
    pub fn new<E: PreviewExecutor>(executor: Arc<E>) -> std::io::Result<(Self, Receiver<PreviewOutcome>)> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: SchedulerState::Idle,
                pending: None,
                generation: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
        });
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("preview-worker".into())
            .spawn(move || run_worker(worker_shared, executor, tx))?;

        Ok((
            Self {
                shared,
                worker: Some(worker),
            },
            rx,
        ))
    }

    /// Queue a preview and return its generation. Never blocks on a running
    /// computation.
    pub fn request(&self, request: PreviewRequest) -> u64 {
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        if let Some((superseded, _)) = inner.pending.replace((generation, request)) {
            log::debug!("preview #{superseded} superseded by #{generation} before it ran");
        }
        inner.state = match inner.state {
            SchedulerState::Idle => SchedulerState::Computing,
            SchedulerState::Computing | SchedulerState::ComputingStale => SchedulerState::ComputingStale,
        };
        self.shared.wake.notify_one();
        generation
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.inner.lock().state
    }

    /// Generation of the most recent request; only its outcome is current.
    pub fn latest_generation(&self) -> u64 {
        self.shared.inner.lock().generation
    }

    /// Block until nothing is running or pending. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let mut inner = self.shared.inner.lock();
        while inner.state != SchedulerState::Idle {
            if self.shared.idle.wait_for(&mut inner, timeout).timed_out() {
                return inner.state == SchedulerState::Idle;
            }
        }
        true
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("preview worker panicked during shutdown");
            }
        }
    }
}

fn run_worker<E: PreviewExecutor>(shared: Arc<Shared>, executor: Arc<E>, tx: Sender<PreviewOutcome>) {
    let mut last: Option<(PreviewRequest, PipelineResult<PipelineOutput>)> = None;

    loop {
        let (generation, request) = {
            let mut inner = shared.inner.lock();
            loop {
                if inner.shutdown {
                    log::debug!("preview worker stopping");
                    return;
                }
                if let Some(job) = inner.pending.take() {
                    inner.state = SchedulerState::Computing;
                    break job;
                }
                shared.wake.wait(&mut inner);
            }
        };

        let result = match &last {
            Some((previous, output)) if previous.same_work(&request) => {
                log::debug!("preview #{generation} reuses the previous result");
                output.clone()
            }
            _ => executor.execute(&request),
        };
        last = Some((request, result.clone()));

        let current = {
            let mut inner = shared.inner.lock();
            if inner.pending.is_some() {
                inner.state = SchedulerState::Computing;
            } else {
                inner.state = SchedulerState::Idle;
                shared.idle.notify_all();
            }
            generation == inner.generation
        };

        if !current {
            log::debug!("dropping stale preview #{generation}");
            continue;
        }
        if tx.send(PreviewOutcome { generation, result }).is_err() {
            log::warn!("preview #{generation} finished but nobody is listening");
        }
    }
}
