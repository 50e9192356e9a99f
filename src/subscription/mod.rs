//! Change subscriptions and reload-time change detection.
//!
//! A subscription watches one path, or one path and all of its descendants,
//! and remembers a [`Fingerprint`] of what it saw in the current snapshot.
//! After each reload the registry recomputes every fingerprint against the
//! new snapshot and signals the channels of those that differ.

mod fingerprint;


use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};

pub use fingerprint::{Fingerprint, INLINE_LIMIT};

use crate::{core::Result, path::clean_path, store::Snapshot};

/// Sending half of an observer channel.
pub type Notifier = mpsc::Sender<()>;

/// Identifies one subscription: a cleaned path and whether it covers the
/// whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    path: String,
    recursive: bool,
}

impl SubscriptionKey {
    /// Creates a key for `path`, cleaning it first.
    pub fn new(path: &str, recursive: bool) -> Self {
        Self {
            path: clean_path(path),
            recursive,
        }
    }

    /// The cleaned path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether descendants are covered.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// The recursive root subscription fires on every reload without being
    /// diffed.
    pub fn is_root(&self) -> bool {
        self.recursive && self.path == "/"
    }

    fn fingerprint(&self, snapshot: &Snapshot) -> Result<Fingerprint> {
        if self.recursive {
            Fingerprint::of_subtree(snapshot, &self.path)
        } else {
            Fingerprint::of_value(snapshot, &self.path)
        }
    }
}

struct Subscription {
    channels: Vec<Notifier>,
    current: Fingerprint,
}

impl Subscription {
    fn contains(&self, channel: &Notifier) -> bool {
        self.channels.iter().any(|ch| ch.same_channel(channel))
    }

    /// Signals every channel and drops those whose receiver is gone.
    fn notify_all(&mut self) {
        self.channels.retain(notify);
    }
}

/// Sends a signal without blocking.
///
/// A full buffer already holds a pending signal, so it counts as delivered.
/// Returns false once the receiver has been dropped.
fn notify(channel: &Notifier) -> bool {
    match channel.try_send(()) {
        Ok(()) | Err(TrySendError::Full(())) => true,
        Err(TrySendError::Closed(())) => false,
    }
}

/// All subscriptions of one module.
///
/// The registry holds a sender clone per channel; it never keeps a channel
/// open on its own once the receiver has been dropped.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `channel` to the subscription for `key`, creating it with a
    /// baseline fingerprint taken from `snapshot` if needed.
    ///
    /// Registering a channel twice is a no-op.
    ///
    /// # Errors
    /// Returns an error if the baseline fingerprint cannot be computed; no
    /// subscription is created in that case.
    pub fn subscribe(
        &mut self,
        key: SubscriptionKey,
        channel: &Notifier,
        snapshot: &Snapshot,
    ) -> Result<()> {
        if let Some(subscription) = self.subscriptions.get_mut(&key) {
            if !subscription.contains(channel) {
                subscription.channels.push(channel.clone());
            }
            return Ok(());
        }

        let current = if key.is_root() {
            Fingerprint::Absent
        } else {
            key.fingerprint(snapshot)?
        };

        debug!(path = %key.path, recursive = key.recursive, "New subscription");
        self.subscriptions.insert(
            key,
            Subscription {
                channels: vec![channel.clone()],
                current,
            },
        );

        Ok(())
    }

    /// Removes one channel; the subscription goes away with its last channel.
    ///
    /// Returns true if the channel was registered.
    pub fn unsubscribe_chan(&mut self, key: &SubscriptionKey, channel: &Notifier) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(key) else {
            return false;
        };

        let before = subscription.channels.len();
        subscription.channels.retain(|ch| !ch.same_channel(channel));
        let removed = subscription.channels.len() != before;

        if subscription.channels.is_empty() {
            self.subscriptions.remove(key);
        }

        removed
    }

    /// Removes the subscription for `key` with all of its channels.
    ///
    /// Returns the number of channels dropped.
    pub fn unsubscribe(&mut self, key: &SubscriptionKey) -> usize {
        self.subscriptions
            .remove(key)
            .map_or(0, |subscription| subscription.channels.len())
    }

    /// Re-evaluates every subscription against a freshly installed snapshot.
    ///
    /// Changed subscriptions signal their channels and adopt the new
    /// fingerprint. A fingerprint that cannot be computed is logged and the
    /// old one kept. Closed channels are pruned, and subscriptions left
    /// without channels are dropped.
    pub fn process(&mut self, snapshot: &Snapshot) {
        self.subscriptions.retain(|key, subscription| {
            if key.is_root() {
                subscription.notify_all();
                return !subscription.channels.is_empty();
            }

            let next = match key.fingerprint(snapshot) {
                Ok(next) => next,
                Err(err) => {
                    error!(path = %key.path, error = %err, "Cannot fingerprint subscription");
                    subscription.channels.retain(|ch| !ch.is_closed());
                    return !subscription.channels.is_empty();
                }
            };

            if next == subscription.current {
                subscription.channels.retain(|ch| !ch.is_closed());
            } else {
                debug!(path = %key.path, recursive = key.recursive, "Subscription changed");
                subscription.notify_all();
                subscription.current = next;
            }

            !subscription.channels.is_empty()
        });
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of channels registered for `key`.
    pub fn channel_count(&self, key: &SubscriptionKey) -> usize {
        self.subscriptions
            .get(key)
            .map_or(0, |subscription| subscription.channels.len())
    }

    /// The stored fingerprint for `key`, if subscribed.
    pub fn fingerprint(&self, key: &SubscriptionKey) -> Option<&Fingerprint> {
        self.subscriptions
            .get(key)
            .map(|subscription| &subscription.current)
    }
}
