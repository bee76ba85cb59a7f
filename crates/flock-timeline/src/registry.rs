//! Registry of open timeline subscriptions
//!
//! Maps a user to the mailboxes of all their live connections. One mutex
//! guards the whole map. Everything done under it is a map operation or a
//! non-blocking [`mailbox::Sender::try_put`], never I/O or an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use flock_core::{TimelineEvent, UserId};
use flock_util_mailbox::{self as mailbox, PutError};
use tracing::debug;

const LOG_TARGET: &str = "flock::registry";

/// Distinguishes concurrent subscriptions of the same user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of [`SubscriberRegistry::try_deliver`] for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Mailboxes that accepted the event
    pub delivered: usize,
    /// Mailboxes still holding an earlier event, which this one was dropped for
    pub full: usize,
}

type EventSender = mailbox::Sender<Arc<TimelineEvent>>;

#[derive(Default)]
struct RegistryInner {
    subscribers: HashMap<UserId, BTreeMap<SubscriptionId, EventSender>>,
    next_id: u64,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("users", &self.user_count())
            .finish_non_exhaustive()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new, empty mailbox for `user_id`
    ///
    /// Every call creates a separate subscription; other subscriptions of
    /// the same user are left alone.
    pub fn acquire(self: &Arc<Self>, user_id: UserId) -> Subscription {
        self.acquire_inner(user_id, mailbox::mailbox())
    }

    /// Like [`Self::acquire`], with `event` already waiting in the mailbox
    ///
    /// The mailbox becomes visible to [`Self::try_deliver`] only with `event`
    /// inside, so nothing can take its place.
    pub fn acquire_primed(
        self: &Arc<Self>,
        user_id: UserId,
        event: Arc<TimelineEvent>,
    ) -> Subscription {
        self.acquire_inner(user_id, mailbox::mailbox_with(event))
    }

    fn acquire_inner(
        self: &Arc<Self>,
        user_id: UserId,
        (tx, rx): (EventSender, mailbox::Receiver<Arc<TimelineEvent>>),
    ) -> Subscription {
        let id = {
            let mut lock = self.inner.lock().expect("Locking failed");
            let id = SubscriptionId(lock.next_id);
            lock.next_id += 1;
            lock.subscribers.entry(user_id).or_default().insert(id, tx);
            id
        };

        debug!(target: LOG_TARGET, %user_id, subscription_id = %id, "Subscription acquired");

        Subscription {
            user_id,
            id,
            rx,
            registry: self.clone(),
        }
    }

    /// Remove one subscription
    ///
    /// Idempotent. Returns `false` if it was not registered (anymore).
    pub fn release(&self, user_id: UserId, id: SubscriptionId) -> bool {
        let removed = {
            let mut lock = self.inner.lock().expect("Locking failed");
            let Some(subs) = lock.subscribers.get_mut(&user_id) else {
                return false;
            };
            let removed = subs.remove(&id).is_some();
            if subs.is_empty() {
                lock.subscribers.remove(&user_id);
            }
            removed
        };

        if removed {
            debug!(target: LOG_TARGET, %user_id, subscription_id = %id, "Subscription released");
        }
        removed
    }

    /// Remove every subscription of `user_id`
    ///
    /// Their [`Subscription::recv`] starts returning `None` once drained.
    /// Returns how many were removed.
    pub fn release_user(&self, user_id: UserId) -> usize {
        let removed = self
            .inner
            .lock()
            .expect("Locking failed")
            .subscribers
            .remove(&user_id)
            .map(|subs| subs.len())
            .unwrap_or_default();

        if 0 < removed {
            debug!(target: LOG_TARGET, %user_id, removed, "All user subscriptions released");
        }
        removed
    }

    /// Offer `event` to every mailbox of `user_id`, without waiting
    ///
    /// A user without subscriptions is skipped, nothing is created for them.
    /// A mailbox still holding an undelivered event rejects the new one.
    pub fn try_deliver(&self, user_id: UserId, event: &Arc<TimelineEvent>) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        {
            let mut lock = self.inner.lock().expect("Locking failed");

            let Some(subs) = lock.subscribers.get_mut(&user_id) else {
                return report;
            };

            subs.retain(|_, tx| match tx.try_put(event.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(PutError::Full(_)) => {
                    report.full += 1;
                    true
                }
                // Receiver went away without releasing, drop the stale entry
                Err(PutError::Closed(_)) => false,
            });

            if subs.is_empty() {
                lock.subscribers.remove(&user_id);
            }
        }

        if 0 < report.full {
            debug!(
                target: LOG_TARGET,
                %user_id,
                full = report.full,
                kind = %event.kind(),
                "Mailbox full, event dropped"
            );
        }
        report
    }

    /// Number of open subscriptions of `user_id`
    pub fn subscriber_count(&self, user_id: UserId) -> usize {
        self.inner
            .lock()
            .expect("Locking failed")
            .subscribers
            .get(&user_id)
            .map(BTreeMap::len)
            .unwrap_or_default()
    }

    /// Number of users with at least one open subscription
    pub fn user_count(&self) -> usize {
        self.inner
            .lock()
            .expect("Locking failed")
            .subscribers
            .len()
    }
}

/// One open subscription, released from the registry when dropped
pub struct Subscription {
    user_id: UserId,
    id: SubscriptionId,
    rx: mailbox::Receiver<Arc<TimelineEvent>>,
    registry: Arc<SubscriberRegistry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("user_id", &self.user_id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the subscription was removed from the registry
    /// and the mailbox is drained. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Arc<TimelineEvent>> {
        self.rx.recv().await.ok()
    }

    /// Take the pending event, if any
    pub fn try_recv(&mut self) -> Option<Arc<TimelineEvent>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(self.user_id, self.id);
    }
}

#[cfg(test)]
mod tests;
