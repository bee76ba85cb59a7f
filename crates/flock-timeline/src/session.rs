//! Server side of one streaming connection
//!
//! A session goes through `Subscribing -> Streaming -> Closed` and never
//! back. Its registry entry lives exactly as long as it is `Streaming`.

use std::fmt;
use std::sync::Arc;

use flock_core::{TimelineEvent, UserId};
use snafu::Snafu;
use tokio::sync::watch;
use tracing::debug;

use crate::registry::{SubscriberRegistry, Subscription};
use crate::store::{ContentStore, IdentityResolver, StoreError};

const LOG_TARGET: &str = "flock::session";

#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("User {user_id} not found"))]
    UserNotFound { user_id: UserId },
    #[snafu(transparent)]
    Store { source: StoreError },
}
pub type SessionResult<T> = std::result::Result<T, SessionError>;

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        match self {
            SessionError::UserNotFound { .. } => true,
            SessionError::Store { source } => source.is_not_found(),
        }
    }
}

/// Lifecycle phase of a [`TimelineSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Only while [`TimelineSession::open`] runs, so [`TimelineSession::state`]
    /// never returns it; shows up in logs
    Subscribing,
    Streaming,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Subscribing => "subscribing",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        })
    }
}

pub struct TimelineSession {
    user_id: UserId,
    /// `Some` while streaming, dropping it releases the registry entry
    subscription: Option<Subscription>,
    shutdown_rx: watch::Receiver<bool>,
}

impl fmt::Debug for TimelineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineSession")
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TimelineSession {
    /// Subscribe `user_id` and queue the snapshot of their current timeline
    ///
    /// The snapshot is read before registering, and placed into the new
    /// mailbox as part of registering, so it is always the first event
    /// returned by [`Self::next_event`].
    pub async fn open(
        store: &dyn ContentStore,
        resolver: &dyn IdentityResolver,
        registry: &Arc<SubscriberRegistry>,
        user_id: UserId,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SessionResult<Self> {
        debug!(target: LOG_TARGET, %user_id, state = %SessionState::Subscribing, "Opening timeline session");

        if !resolver.user_exists(user_id).await? {
            return UserNotFoundSnafu { user_id }.fail();
        }

        let posts = store.current_timeline(user_id).await?;
        let snapshot_len = posts.len();
        let subscription = registry.acquire_primed(user_id, Arc::new(TimelineEvent::snapshot(posts)));

        debug!(
            target: LOG_TARGET,
            %user_id,
            subscription_id = %subscription.id(),
            snapshot_len,
            state = %SessionState::Streaming,
            "Timeline session open"
        );

        Ok(Self {
            user_id,
            subscription: Some(subscription),
            shutdown_rx,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// [`SessionState::Streaming`] or [`SessionState::Closed`]
    ///
    /// An opened session is already past [`SessionState::Subscribing`].
    pub fn state(&self) -> SessionState {
        if self.subscription.is_some() {
            SessionState::Streaming
        } else {
            SessionState::Closed
        }
    }

    /// Wait for the next event to forward to the client
    ///
    /// Returns `None` once the session is closed: on shutdown, when the
    /// registry dropped the mailbox, or after [`Self::close`]. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<Arc<TimelineEvent>> {
        let subscription = self.subscription.as_mut()?;

        let event = tokio::select! {
            biased;
            // Also fires if the shutdown sender is gone
            _ = self.shutdown_rx.wait_for(|shutdown| *shutdown) => None,
            event = subscription.recv() => event,
        };

        if event.is_none() {
            self.close();
        }
        event
    }

    /// Release the registry entry; idempotent
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(
                target: LOG_TARGET,
                user_id = %self.user_id,
                subscription_id = %subscription.id(),
                state = %SessionState::Closed,
                "Timeline session closed"
            );
        }
    }
}

impl Drop for TimelineSession {
    fn drop(&mut self) {
        self.close();
    }
}
