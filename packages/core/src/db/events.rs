//! Change Notifications
//!
//! Payload-free "something changed" signals for the nodes table, built on
//! tokio's broadcast channel.
//!
//! # Why no payload?
//!
//! The channel deliberately carries no diff. Consumers must treat every
//! signal as "re-fetch everything", which pushes all reconciliation into a
//! single refetch-and-replace strategy and eliminates the whole class of
//! partial-merge bugs. Delivery is at-least-once: a receiver that lags
//! behind treats the lag itself as one more signal, since coalescing
//! payload-free signals is always safe.

use tokio::sync::broadcast;

/// Default broadcast capacity. Signals coalesce on lag, so this only needs
/// to absorb short bursts.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Content-free change marker for the owner's nodes table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal;

/// Sending half: the store emits one signal after every successful mutation.
///
/// Cloning shares the underlying channel, so several store handles (for
/// example two sessions over the same database) fan into the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeSignal>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Emit one change signal. Having no subscribers is not an error.
    pub fn notify(&self) {
        let _ = self.tx.send(ChangeSignal);
    }

    /// Number of live subscriptions (diagnostics).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half, returned by `subscribe`.
///
/// The owner holds this for its whole mount lifetime and releases it exactly
/// once on teardown; both [`ChangeSubscription::unsubscribe`] and dropping
/// are safe, and unsubscribing twice is a no-op.
#[derive(Debug)]
pub struct ChangeSubscription {
    rx: Option<broadcast::Receiver<ChangeSignal>>,
}

impl ChangeSubscription {
    /// Wait for the next change signal.
    ///
    /// Returns `None` once the subscription is closed (either end). A lagged
    /// receiver yields a signal immediately: missed notifications collapse
    /// into one, which is exactly the refetch-everything contract.
    pub async fn changed(&mut self) -> Option<ChangeSignal> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Ok(signal) => Some(signal),
            Err(broadcast::error::RecvError::Lagged(_)) => Some(ChangeSignal),
            Err(broadcast::error::RecvError::Closed) => {
                self.rx = None;
                None
            }
        }
    }

    /// Release the subscription. Idempotent and safe during teardown.
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    /// True while the subscription can still receive signals.
    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_subscriber() {
        tokio_test::block_on(async {
            let notifier = ChangeNotifier::new();
            let mut sub = notifier.subscribe();

            notifier.notify();
            assert_eq!(sub.changed().await, Some(ChangeSignal));
        });
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        tokio_test::block_on(async {
            let notifier = ChangeNotifier::new();
            let mut sub = notifier.subscribe();
            assert!(sub.is_active());

            sub.unsubscribe();
            sub.unsubscribe();
            assert!(!sub.is_active());
            assert_eq!(sub.changed().await, None);
            assert_eq!(notifier.receiver_count(), 0);
        });
    }

    #[test]
    fn test_lagged_receiver_still_observes_a_signal() {
        tokio_test::block_on(async {
            let notifier = ChangeNotifier::with_capacity(2);
            let mut sub = notifier.subscribe();

            // Overflow the channel; the subscriber must still wake up with
            // at least one signal (missed ones coalesce).
            for _ in 0..10 {
                notifier.notify();
            }
            assert_eq!(sub.changed().await, Some(ChangeSignal));
        });
    }

    #[test]
    fn test_cloned_notifier_shares_channel() {
        tokio_test::block_on(async {
            let notifier = ChangeNotifier::new();
            let clone = notifier.clone();
            let mut sub = notifier.subscribe();

            clone.notify();
            assert_eq!(sub.changed().await, Some(ChangeSignal));
        });
    }

    #[test]
    fn test_closed_channel_ends_subscription() {
        tokio_test::block_on(async {
            let notifier = ChangeNotifier::new();
            let mut sub = notifier.subscribe();
            drop(notifier);

            assert_eq!(sub.changed().await, None);
            assert!(!sub.is_active());
        });
    }
}
