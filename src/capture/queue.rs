//! Bounded hand-off from hook threads to the single consumer
//!
//! Producers never block: when the queue is full the newest event is dropped
//! and counted.

use crate::capture::flags::CaptureFlags;
use crate::capture::programs::ForegroundPid;
use crate::capture::types::{RawInput, RawInputEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Create a queue holding at most `capacity` raw events
pub fn event_queue(capacity: usize, flags: Arc<CaptureFlags>) -> (EventProducer, EventConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventProducer {
            tx,
            flags,
            dropped: dropped.clone(),
            foreground: None,
        },
        EventConsumer { rx, dropped },
    )
}

/// Hook-side handle, cheap to clone into each hook thread
#[derive(Clone)]
pub struct EventProducer {
    tx: Sender<RawInputEvent>,
    flags: Arc<CaptureFlags>,
    dropped: Arc<AtomicU64>,
    foreground: Option<Arc<dyn ForegroundPid>>,
}

impl EventProducer {
    /// Tag pushed inputs with the foreground process from `source`
    pub fn with_foreground(mut self, source: Arc<dyn ForegroundPid>) -> Self {
        self.foreground = Some(source);
        self
    }

    /// Stamp and enqueue a raw input. Returns whether it was queued.
    pub fn push(&self, input: RawInput) -> bool {
        if !self.flags.is_input_enabled(input.input()) {
            return false;
        }
        let pid = self.foreground.as_ref().and_then(|source| source.active_pid());
        self.push_event(RawInputEvent::now(input).with_pid(pid))
    }

    /// Enqueue an already stamped event. Returns whether it was queued.
    pub fn push_event(&self, event: RawInputEvent) -> bool {
        if !self.flags.is_input_enabled(event.input.input()) {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total.is_power_of_two() {
                    tracing::warn!("Input queue full, {} events dropped so far", total);
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer-side handle
pub struct EventConsumer {
    rx: Receiver<RawInputEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventConsumer {
    pub fn receiver(&self) -> &Receiver<RawInputEvent> {
        &self.rx
    }

    /// Take everything currently queued, in arrival order
    pub fn drain(&self) -> Vec<RawInputEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Events dropped at the producer side because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::flags::CaptureTarget;
    use crate::capture::types::InputKind;

    fn make_move(x: f64) -> RawInputEvent {
        RawInputEvent::at(RawInput::MouseMove { x, y: 0.0 }, 1000.0 + x)
    }

    #[test]
    fn test_overflow_drops_newest_without_blocking() {
        let (producer, consumer) = event_queue(2, Arc::new(CaptureFlags::default()));

        assert!(producer.push_event(make_move(1.0)));
        assert!(producer.push_event(make_move(2.0)));
        assert!(!producer.push_event(make_move(3.0)));
        assert!(!producer.push_event(make_move(4.0)));

        assert_eq!(consumer.dropped(), 2);
        let queued = consumer.drain();
        assert_eq!(queued, vec![make_move(1.0), make_move(2.0)]);

        // Space frees up again once drained
        assert!(producer.push_event(make_move(5.0)));
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn test_push_tags_foreground_pid() {
        let (producer, consumer) = event_queue(8, Arc::new(CaptureFlags::default()));
        assert!(producer.push(RawInput::MouseMove { x: 1.0, y: 1.0 }));
        let producer = producer.with_foreground(Arc::new(|| Some(4242u32)));
        assert!(producer.push(RawInput::MouseMove { x: 2.0, y: 2.0 }));

        let pids: Vec<_> = consumer.drain().into_iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![None, Some(4242)]);
    }

    #[test]
    fn test_disabled_input_is_not_queued() {
        let flags = Arc::new(CaptureFlags::default());
        let (producer, consumer) = event_queue(8, flags.clone());
        flags.toggle(CaptureTarget::Input(InputKind::Mouse), false);

        assert!(!producer.push_event(make_move(1.0)));
        assert!(consumer.is_empty());
        assert_eq!(consumer.dropped(), 0);
    }
}
