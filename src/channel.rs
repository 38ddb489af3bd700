//! Error reporting channel - bounded transport for diagnostics.
//!
//! A fixed-capacity FIFO the coordinator pushes [`Diagnostic`]s onto and the
//! host process drains. Pure transport: no retry, no backoff. What happens
//! when the channel is full is an explicit configuration choice
//! ([`OverflowPolicy`]) rather than an implicit blocking default; `Block`
//! reproduces the reference behavior, where a slow consumer stalls the
//! reload loop once capacity is exhausted.

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};

use crate::diag::Diagnostic;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 5;

/// What `push` does when the channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Block the producer until the consumer drains (reference behavior).
    /// Documented hazard: an absent consumer stalls the reload loop.
    #[default]
    Block,
    /// Evict the oldest queued diagnostic to make room for the new one.
    DropOldest,
    /// Discard the new diagnostic, keeping what is already queued.
    DropNewest,
}

/// Producer half held by the coordinator (single producer, FIFO delivery).
#[derive(Debug, Clone)]
pub struct DiagnosticSender {
    tx: Sender<Diagnostic>,
    /// Used by `DropOldest` to evict the head when full. `None` for the
    /// other policies so consumer disconnect stays observable to `send`.
    drain: Option<Receiver<Diagnostic>>,
    policy: OverflowPolicy,
}

impl DiagnosticSender {
    /// Push one diagnostic, applying the overflow policy.
    ///
    /// A disconnected consumer is not an error: the diagnostic is dropped
    /// silently, since there is nobody left to report to.
    pub fn push(&self, diag: Diagnostic) {
        match self.policy {
            OverflowPolicy::Block => {
                let _ = self.tx.send(diag);
            }
            OverflowPolicy::DropNewest => {
                let _ = self.tx.try_send(diag);
            }
            OverflowPolicy::DropOldest => {
                let Some(drain) = &self.drain else { return };
                let mut diag = diag;
                loop {
                    match self.tx.try_send(diag) {
                        Ok(()) => break,
                        Err(TrySendError::Full(returned)) => {
                            let _ = drain.try_recv();
                            diag = returned;
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
        }
    }
}

/// Create a bounded diagnostic channel.
///
/// The consumer side is a plain crossbeam [`Receiver`]; `try_recv` is the
/// recommended non-blocking drain.
///
/// `capacity` is clamped to at least 1: a zero-capacity crossbeam channel
/// is a rendezvous, where `push` could never complete without a consumer
/// already waiting - `Block` would stall the producer forever and
/// `DropOldest` would spin with nothing to evict.
pub fn diagnostic_channel(
    capacity: usize,
    policy: OverflowPolicy,
) -> (DiagnosticSender, Receiver<Diagnostic>) {
    let (tx, rx) = bounded(capacity.max(1));
    let drain = matches!(policy, OverflowPolicy::DropOldest).then(|| rx.clone());
    let sender = DiagnosticSender { tx, drain, policy };
    (sender, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn notifier_diag(n: usize) -> Diagnostic {
        Diagnostic::Notifier(notify::Error::generic(&format!("err {n}")))
    }

    fn message_of(diag: &Diagnostic) -> String {
        use std::error::Error;
        diag.source().map(|s| s.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = diagnostic_channel(5, OverflowPolicy::Block);
        for n in 0..3 {
            tx.push(notifier_diag(n));
        }
        for n in 0..3 {
            let diag = rx.try_recv().unwrap();
            assert_eq!(message_of(&diag), format!("err {n}"));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_oldest_keeps_newest_five() {
        let (tx, rx) = diagnostic_channel(5, OverflowPolicy::DropOldest);
        for n in 0..6 {
            tx.push(notifier_diag(n));
        }
        let got: Vec<_> = rx.try_iter().map(|d| message_of(&d)).collect();
        assert_eq!(got, ["err 1", "err 2", "err 3", "err 4", "err 5"]);
    }

    #[test]
    fn test_drop_newest_keeps_oldest_five() {
        let (tx, rx) = diagnostic_channel(5, OverflowPolicy::DropNewest);
        for n in 0..6 {
            tx.push(notifier_diag(n));
        }
        let got: Vec<_> = rx.try_iter().map(|d| message_of(&d)).collect();
        assert_eq!(got, ["err 0", "err 1", "err 2", "err 3", "err 4"]);
    }

    #[test]
    fn test_block_policy_stalls_sixth_push() {
        let (tx, rx) = diagnostic_channel(5, OverflowPolicy::Block);
        for n in 0..5 {
            tx.push(notifier_diag(n));
        }

        let done = Arc::new(AtomicBool::new(false));
        let done_flag = done.clone();
        let producer = std::thread::spawn(move || {
            tx.push(notifier_diag(5));
            done_flag.store(true, Ordering::SeqCst);
        });

        // The sixth push must still be blocked while the channel is full
        std::thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst));

        // Draining one slot unblocks it
        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(message_of(&first), "err 0");
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        // Capacity 0 would be a rendezvous channel; every push must still
        // return without a consumer standing by.
        let (tx, rx) = diagnostic_channel(0, OverflowPolicy::DropOldest);
        tx.push(notifier_diag(0));
        tx.push(notifier_diag(1)); // evicts the first, does not spin
        let got: Vec<_> = rx.try_iter().map(|d| message_of(&d)).collect();
        assert_eq!(got, ["err 1"]);

        let (tx, rx) = diagnostic_channel(0, OverflowPolicy::Block);
        tx.push(notifier_diag(2)); // one slot available, producer not stalled
        assert_eq!(message_of(&rx.try_recv().unwrap()), "err 2");
    }

    #[test]
    fn test_push_to_disconnected_consumer_is_silent() {
        let (tx, rx) = diagnostic_channel(1, OverflowPolicy::Block);
        drop(rx);
        tx.push(Diagnostic::ShuttingDown);
    }
}
