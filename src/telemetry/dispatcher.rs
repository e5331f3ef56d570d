//! Telemetry dispatch worker.
//!
//! The run thread hands each [`IterationRecord`] to a bounded channel with
//! a non-blocking send and moves on; a dedicated worker forwards records to
//! the sink. Overflow never stalls an iteration — records are dropped and
//! counted instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::{IterationRecord, LogSink, SinkSession};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Max queued records before overflow drops apply.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Owns the telemetry worker thread and the channel feeding it.
pub struct Dispatcher {
    tx: Sender<IterationRecord>,
    dropped: AtomicU64,
    rejected: Arc<AtomicU64>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts the worker around `sink`.
    #[must_use]
    pub fn new(cfg: DispatcherConfig, sink: Box<dyn LogSink>) -> Self {
        let (tx, rx) = bounded::<IterationRecord>(cfg.queue_capacity.max(1));
        let rejected = Arc::new(AtomicU64::new(0));

        let worker_rejected = Arc::clone(&rejected);
        let join = thread::Builder::new()
            .name("statesim-telemetry".to_string())
            .spawn(move || worker_loop(&rx, sink, &worker_rejected))
            .expect("failed to spawn statesim telemetry worker");

        Self {
            tx,
            dropped: AtomicU64::new(0),
            rejected,
            join: Mutex::new(Some(join)),
        }
    }

    /// Enqueues one record without blocking. A full queue drops the record
    /// and counts it.
    pub(crate) fn publish(&self, record: IterationRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Worker already gone; shutdown is in progress.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Records dropped because the queue was full.
    #[must_use]
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records the sink refused to acknowledge.
    #[must_use]
    pub fn rejected_records(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Close the channel: the worker drains queued records then exits.
        let (dummy, _rx) = bounded::<IterationRecord>(1);
        drop(std::mem::replace(&mut self.tx, dummy));
        if let Ok(mut guard) = self.join.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(rx: &Receiver<IterationRecord>, mut sink: Box<dyn LogSink>, rejected: &AtomicU64) {
    let Some(mut session) = SinkSession::open(sink.as_mut()) else {
        tracing::warn!("telemetry sink failed to connect; records will be discarded");
        while rx.recv().is_ok() {}
        return;
    };

    while let Ok(record) = rx.recv() {
        if !session.log_data(&record) {
            rejected.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulationId;
    use chrono::Utc;

    fn record(iteration: u64) -> IterationRecord {
        IterationRecord {
            simulation: SimulationId::new(),
            iteration,
            timestamp: Utc::now(),
            data: serde_json::json!({}),
        }
    }

    struct CollectingSink {
        seen: Arc<Mutex<Vec<u64>>>,
        acknowledge: bool,
        closed: Arc<AtomicU64>,
    }

    impl LogSink for CollectingSink {
        fn connect(&mut self) -> bool {
            true
        }

        fn log_data(&mut self, record: &IterationRecord) -> bool {
            self.seen.lock().unwrap().push(record.iteration);
            self.acknowledge
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn drains_queued_records_before_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicU64::new(0));
        let dispatcher = Dispatcher::new(
            DispatcherConfig::default(),
            Box::new(CollectingSink {
                seen: Arc::clone(&seen),
                acknowledge: true,
                closed: Arc::clone(&closed),
            }),
        );

        for i in 0..10 {
            dispatcher.publish(record(i));
        }
        drop(dispatcher);

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(closed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn counts_rejected_records() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicU64::new(0));
        let dispatcher = Dispatcher::new(
            DispatcherConfig::default(),
            Box::new(CollectingSink {
                seen,
                acknowledge: false,
                closed,
            }),
        );

        dispatcher.publish(record(0));
        dispatcher.publish(record(1));
        let rejected = Arc::clone(&dispatcher.rejected);
        drop(dispatcher);

        assert_eq!(rejected.load(Ordering::Relaxed), 2);
    }

    struct GatedSink {
        started: std::sync::mpsc::Sender<()>,
        gate: std::sync::mpsc::Receiver<()>,
    }

    impl LogSink for GatedSink {
        fn connect(&mut self) -> bool {
            true
        }

        fn log_data(&mut self, _record: &IterationRecord) -> bool {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            true
        }

        fn close(&mut self) {}
    }

    #[test]
    fn overflow_drops_records_and_counts_them() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let dispatcher = Dispatcher::new(
            DispatcherConfig { queue_capacity: 1 },
            Box::new(GatedSink {
                started: started_tx,
                gate: gate_rx,
            }),
        );

        dispatcher.publish(record(0));
        // The worker is now blocked inside log_data; the queue is empty.
        started_rx.recv().unwrap();
        dispatcher.publish(record(1));
        dispatcher.publish(record(2));

        assert_eq!(dispatcher.dropped_records(), 1);

        drop(gate_tx);
        drop(dispatcher);
    }

    #[test]
    fn dropped_counter_starts_at_zero() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default(), Box::new(super::super::NullSink));
        assert_eq!(dispatcher.dropped_records(), 0);
        assert_eq!(dispatcher.rejected_records(), 0);
    }
}
