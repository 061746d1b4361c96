use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::data::model::{Peak, PeakBoundary, Spectrum};
use crate::data::range::RangeSet;
use crate::error::{PipelineError, PipelineResult};
use crate::processing::ProcessingParameters;

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// One committed operation and the spectrum it produced.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
    pub parameters: ProcessingParameters,
    pub ranges: RangeSet,
    pub result: Arc<Spectrum>,
    pub peaks: Vec<Peak>,
    pub boundaries: Vec<PeakBoundary>,
}

// ---------------------------------------------------------------------------
// HistoryManager – linear undo/redo over committed results
// ---------------------------------------------------------------------------

/// `cursor` counts the applied entries: `entries[..cursor]` are live,
/// `entries[cursor..]` are the undone tail kept for redo. `floor` is what
/// a fully undone history shows: the original spectrum, or the result of
/// the newest entry dropped by the limit.
#[derive(Debug)]
pub struct HistoryManager {
    original: Arc<Spectrum>,
    floor: Arc<Spectrum>,
    entries: Vec<HistoryEntry>,
    cursor: usize,
    next_sequence: u64,
    limit: Option<usize>,
}

impl HistoryManager {
    pub fn new(original: Arc<Spectrum>) -> Self {
        Self {
            floor: Arc::clone(&original),
            original,
            entries: Vec::new(),
            cursor: 0,
            next_sequence: 1,
            limit: None,
        }
    }

    /// Keep at most `limit` committed entries, dropping the oldest.
    pub fn with_limit(original: Arc<Spectrum>, limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new(original)
        }
    }

    /// Record a new result. Any undone tail is discarded.
    pub fn commit(
        &mut self,
        parameters: ProcessingParameters,
        ranges: RangeSet,
        result: Arc<Spectrum>,
        peaks: Vec<Peak>,
        boundaries: Vec<PeakBoundary>,
    ) -> HistoryEntry {
        let discarded = self.entries.len() - self.cursor;
        if discarded > 0 {
            log::debug!("discarding {discarded} redo entr(ies)");
            self.entries.truncate(self.cursor);
        }

        let entry = HistoryEntry {
            sequence: self.next_sequence,
            timestamp: Local::now(),
            parameters,
            ranges,
            result,
            peaks,
            boundaries,
        };
        self.next_sequence += 1;
        self.entries.push(entry.clone());

        if let Some(limit) = self.limit {
            if self.entries.len() > limit {
                let excess = self.entries.len() - limit;
                if let Some(newest_dropped) = self.entries.drain(..excess).last() {
                    self.floor = newest_dropped.result;
                }
                log::debug!("history limit {limit} reached, dropped {excess} oldest entr(ies)");
            }
        }
        self.cursor = self.entries.len();

        log::info!("committed operation #{}", entry.sequence);
        entry
    }

    /// Step back one entry and return the spectrum now current.
    pub fn undo(&mut self) -> PipelineResult<Arc<Spectrum>> {
        if !self.can_undo() {
            return Err(PipelineError::NoHistory);
        }
        self.cursor -= 1;
        log::info!("undo → {} applied operation(s)", self.cursor);
        Ok(self.current())
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self) -> PipelineResult<Arc<Spectrum>> {
        if !self.can_redo() {
            return Err(PipelineError::NoRedo);
        }
        self.cursor += 1;
        log::info!("redo → {} applied operation(s)", self.cursor);
        Ok(self.current())
    }

    /// The committed spectrum at the cursor, or the undo floor when nothing
    /// is applied.
    pub fn current(&self) -> Arc<Spectrum> {
        match self.current_entry() {
            Some(entry) => Arc::clone(&entry.result),
            None => Arc::clone(&self.floor),
        }
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The raw spectrum the history started from.
    pub fn original(&self) -> Arc<Spectrum> {
        Arc::clone(&self.original)
    }

    /// Applied entries, oldest first.
    pub fn applied(&self) -> &[HistoryEntry] {
        &self.entries[..self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
