//! Retrying write path in front of a store
//!
//! Records are written in submission order. Whatever a failed write leaves
//! unwritten stays at the head of the backlog and goes out before anything
//! submitted later.

use crate::config::ListenerConfig;
use crate::storage::{BatchError, EventStore, Record};
use serde::Serialize;
use std::collections::VecDeque;

/// Outcome of one write cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Records stored in this cycle
    pub written: usize,
    /// Records waiting for the next cycle
    pub pending: usize,
    /// Records discarded in this cycle because the backlog was full
    pub dropped: usize,
    /// Last write error, if the cycle failed
    pub error: Option<String>,
    /// Storage has failed for too many consecutive cycles
    pub failing: bool,
}

pub struct EventSink<S> {
    store: S,
    backlog: VecDeque<Record>,
    max_pending: usize,
    warn_after: u32,
    failed_cycles: u32,
    written_total: u64,
    dropped_total: u64,
}

impl<S: EventStore> EventSink<S> {
    pub fn new(store: S, config: &ListenerConfig) -> Self {
        Self {
            store,
            backlog: VecDeque::new(),
            max_pending: config.max_pending_writes.max(1),
            warn_after: config.storage_failure_warn_after.max(1),
            failed_cycles: 0,
            written_total: 0,
            dropped_total: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    pub fn written_total(&self) -> u64 {
        self.written_total
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    pub fn reconfigure(&mut self, config: &ListenerConfig) {
        self.max_pending = config.max_pending_writes.max(1);
        self.warn_after = config.storage_failure_warn_after.max(1);
    }

    /// Queue records behind any backlog and run a write cycle
    pub fn submit(&mut self, records: Vec<Record>) -> FlushReport {
        self.backlog.extend(records);

        let overflow = self.backlog.len().saturating_sub(self.max_pending);
        if overflow > 0 {
            self.backlog.drain(..overflow);
            self.dropped_total += overflow as u64;
            tracing::warn!(
                "Write backlog over {} records, dropped {} oldest",
                self.max_pending,
                overflow
            );
        }

        let mut report = self.flush();
        report.dropped = overflow;
        report
    }

    /// Write the backlog, keeping whatever fails for the next cycle
    pub fn flush(&mut self) -> FlushReport {
        if self.backlog.is_empty() {
            return FlushReport::default();
        }

        let batch = self.backlog.make_contiguous();
        let total = batch.len();
        let mut report = FlushReport::default();
        match self.store.insert_batch(batch) {
            Ok(()) => {
                self.backlog.clear();
                self.failed_cycles = 0;
                report.written = total;
            }
            Err(BatchError { written, source }) => {
                let written = written.min(total);
                self.backlog.drain(..written);
                self.failed_cycles += 1;
                report.written = written;
                report.error = Some(source.to_string());
                if self.failed_cycles >= self.warn_after {
                    report.failing = true;
                    tracing::error!(
                        "Storage failing for {} cycles, {} records pending: {}",
                        self.failed_cycles,
                        self.backlog.len(),
                        source
                    );
                } else {
                    tracing::warn!(
                        "Write failed after {} of {} records, retrying next cycle: {}",
                        written,
                        total,
                        source
                    );
                }
            }
        }
        self.written_total += report.written as u64;
        report.pending = self.backlog.len();
        report
    }
}
