//! Single-slot mailbox
//!
//! A mailbox holds at most one undelivered item. It connects exactly one
//! [`Sender`] with exactly one [`Receiver`].
//!
//! The overflow policy is **reject-new-on-full**: [`Sender::try_put`] never
//! blocks and never replaces a pending item. If the slot is occupied the new
//! item is handed back in [`PutError::Full`], so the oldest pending item is
//! always the next one the [`Receiver`] observes.
//!
//! Dropping the [`Sender`] closes the mailbox for the [`Receiver`], but an item
//! already in the slot is still delivered first. Dropping the [`Receiver`]
//! makes every following `try_put` fail with [`PutError::Closed`].

use std::fmt;
use std::sync::{Arc, Mutex};

use snafu::Snafu;
use tokio::sync::watch;

#[derive(Snafu, Debug, PartialEq, Eq)]
pub enum RecvError {
    /// The [`Sender`] is gone and the slot is empty
    Closed,
}

#[derive(Snafu, Debug, PartialEq, Eq)]
#[snafu(module)]
pub enum TryRecvError {
    Empty,
    Closed,
}

pub enum PutError<T> {
    /// The slot already holds an undelivered item
    Full(T),
    /// The [`Receiver`] is gone
    Closed(T),
}

impl<T> PutError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(v) | PutError::Closed(v) => v,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PutError::Full(_))
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PutError::Full(_) => "PutError::Full",
            PutError::Closed(_) => "PutError::Closed",
        })
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PutError::Full(_) => "mailbox full",
            PutError::Closed(_) => "mailbox closed",
        })
    }
}

impl<T> std::error::Error for PutError<T> {}

struct Slot<T> {
    value: Option<T>,
    /// Items turned away because the slot was occupied
    rejected: u64,
}

/// Create an empty mailbox
pub fn mailbox<T>() -> (Sender<T>, Receiver<T>) {
    new_mailbox(None)
}

/// Create a mailbox with `initial` already sitting in the slot
///
/// Nothing can be put into it until the [`Receiver`] takes `initial` out.
pub fn mailbox_with<T>(initial: T) -> (Sender<T>, Receiver<T>) {
    new_mailbox(Some(initial))
}

fn new_mailbox<T>(value: Option<T>) -> (Sender<T>, Receiver<T>) {
    let slot = Arc::new(Mutex::new(Slot { value, rejected: 0 }));
    let (tx, rx) = watch::channel(());

    (
        Sender {
            slot: slot.clone(),
            tx,
        },
        Receiver { slot, rx },
    )
}

pub struct Sender<T> {
    slot: Arc<Mutex<Slot<T>>>,
    tx: watch::Sender<()>,
}

impl<T> Sender<T> {
    /// Put `v` into the slot without waiting
    ///
    /// Fails with [`PutError::Full`] if the previous item was not taken yet,
    /// and with [`PutError::Closed`] if the [`Receiver`] was dropped.
    pub fn try_put(&self, v: T) -> Result<(), PutError<T>> {
        if self.tx.is_closed() {
            return Err(PutError::Closed(v));
        }

        {
            let mut lock = self.slot.lock().expect("Locking failed");
            if lock.value.is_some() {
                lock.rejected += 1;
                return Err(PutError::Full(v));
            }
            lock.value = Some(v);
        }

        self.tx.send_replace(());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of items rejected so far because the slot was occupied
    pub fn rejected_count(&self) -> u64 {
        self.slot.lock().expect("Locking failed").rejected
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// The receiving end of a mailbox
///
/// Not `Clone`: a mailbox has exactly one consumer.
pub struct Receiver<T> {
    slot: Arc<Mutex<Slot<T>>>,
    rx: watch::Receiver<()>,
}

impl<T> Receiver<T> {
    fn take(&self) -> Option<T> {
        self.slot.lock().expect("Locking failed").value.take()
    }

    /// Wait for the next item
    ///
    /// Cancel-safe: an item is only removed from the slot synchronously, so
    /// dropping the returned future inside `tokio::select!` loses nothing.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        loop {
            if let Some(v) = self.take() {
                return Ok(v);
            }

            if self.rx.changed().await.is_err() {
                // The sender could have put an item right before going away
                return self.take().ok_or(RecvError::Closed);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        if let Some(v) = self.take() {
            return Ok(v);
        }
        if self.rx.has_changed().is_err() {
            return Err(TryRecvError::Closed);
        }
        Err(TryRecvError::Empty)
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
