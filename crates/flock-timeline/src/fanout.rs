//! Fan-out of timeline events to their audience
//!
//! Jobs are queued without waiting and handled by a fixed pool of workers.
//! Each worker owns a bounded queue, and jobs are sharded by actor, so events
//! caused by one user are fanned out in the order they were queued.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use flock_core::{RepostParent, TimelineEvent, UserId};
use flock_util_error::FmtCompact as _;
use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::registry::SubscriberRegistry;
use crate::store::{IdentityResolver, StoreError};

const LOG_TARGET: &str = "flock::fanout";

/// One event to be delivered to the audience of `actor`
#[derive(Debug, Clone)]
pub struct FanOutJob {
    /// User whose action caused the event
    pub actor: UserId,
    /// Extra recipient outside the actor's audience, e.g. the author of a
    /// reposted post
    pub also_notify: Option<UserId>,
    /// Also notify the author of this repost parent, looked up when the job
    /// is fanned out
    pub also_notify_author_of: Option<RepostParent>,
    /// Followers of the actor captured at write time, used instead of
    /// resolving them
    pub followers: Option<Arc<BTreeSet<UserId>>>,
    pub event: Arc<TimelineEvent>,
}

impl FanOutJob {
    pub fn new(actor: UserId, event: TimelineEvent) -> Self {
        Self {
            actor,
            also_notify: None,
            also_notify_author_of: None,
            followers: None,
            event: Arc::new(event),
        }
    }

    pub fn also_notify(self, also_notify: Option<UserId>) -> Self {
        Self {
            also_notify,
            ..self
        }
    }

    pub fn also_notify_author_of(self, parent: RepostParent) -> Self {
        Self {
            also_notify_author_of: Some(parent),
            ..self
        }
    }

    pub fn with_followers(self, followers: Arc<BTreeSet<UserId>>) -> Self {
        Self {
            followers: Some(followers),
            ..self
        }
    }
}

#[derive(Debug, Snafu)]
pub enum FanOutError {
    #[snafu(display("Resolving followers of {actor} failed"))]
    Audience { actor: UserId, source: StoreError },
}
pub type FanOutResult<T> = std::result::Result<T, FanOutError>;

/// What a single [`fan_out`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutReport {
    /// Size of the audience, subscribed or not
    pub audience: usize,
    /// Mailboxes the event was put into
    pub delivered: usize,
    /// Mailboxes that were full and dropped the event
    pub full: usize,
}

/// Deliver `job` to its audience, right now
///
/// The audience is the actor, the actor's direct followers,
/// [`FanOutJob::also_notify`] and the author of
/// [`FanOutJob::also_notify_author_of`]. Users without an open subscription
/// are skipped. Followers come from [`FanOutJob::followers`] when set. If
/// they can't be resolved nothing is delivered at all. If only the parent author can't be resolved, the rest of the
/// audience still gets the event.
pub async fn fan_out(
    resolver: &dyn IdentityResolver,
    registry: &SubscriberRegistry,
    job: &FanOutJob,
) -> FanOutResult<FanOutReport> {
    let mut audience: BTreeSet<UserId> = match &job.followers {
        Some(followers) => followers.as_ref().clone(),
        None => resolver
            .followers_of(job.actor)
            .await
            .context(AudienceSnafu { actor: job.actor })?,
    };
    audience.insert(job.actor);
    audience.extend(job.also_notify);
    if let Some(parent) = job.also_notify_author_of {
        audience.extend(parent_author(resolver, parent).await);
    }

    let mut report = FanOutReport {
        audience: audience.len(),
        ..Default::default()
    };

    for user_id in audience {
        let delivery = registry.try_deliver(user_id, &job.event);
        report.delivered += delivery.delivered;
        report.full += delivery.full;
    }

    Ok(report)
}

async fn parent_author(resolver: &dyn IdentityResolver, parent: RepostParent) -> Option<UserId> {
    match resolver.parent_author(parent).await {
        Ok(author) => author,
        Err(err) => {
            warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Could not look up repost parent author");
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FanOutConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Capacity of each worker's job queue
    pub queue_capacity: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Counters of a [`FanOut`], safe to read at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FanOutStats {
    /// Jobs accepted into a queue
    pub enqueued: u64,
    /// Jobs dropped because their queue was full or closed
    pub dropped: u64,
    /// Jobs fully fanned out
    pub completed: u64,
    /// Jobs abandoned because the audience could not be resolved
    pub failed: u64,
    /// Events put into subscriber mailboxes
    pub delivered: u64,
    /// Events rejected by full subscriber mailboxes
    pub mailbox_full: u64,
    /// Jobs waiting in the queues right now
    pub backlog: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    delivered: AtomicU64,
    mailbox_full: AtomicU64,
}

impl Counters {
    fn inc(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Worker pool running [`fan_out`] for queued jobs
pub struct FanOut {
    /// Emptied on shutdown, which closes the queues
    queues: RwLock<Vec<mpsc::Sender<FanOutJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl FanOut {
    /// Spawn the workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        resolver: Arc<dyn IdentityResolver>,
        registry: Arc<SubscriberRegistry>,
        config: FanOutConfig,
    ) -> Self {
        let workers_num = config.workers.max(1);
        let counters = Arc::new(Counters::default());

        let mut queues = Vec::with_capacity(workers_num);
        let mut workers = Vec::with_capacity(workers_num);
        for worker_id in 0..workers_num {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            queues.push(tx);
            workers.push(tokio::spawn(
                FanOutWorker {
                    worker_id,
                    rx,
                    resolver: resolver.clone(),
                    registry: registry.clone(),
                    counters: counters.clone(),
                }
                .run(),
            ));
        }

        info!(
            target: LOG_TARGET,
            workers = workers_num,
            queue_capacity = config.queue_capacity,
            "Fan-out started"
        );

        Self {
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Queue `job` without waiting
    ///
    /// Returns `false` if the job was dropped because its queue is full or
    /// the pool is shut down. The write that caused it is not affected.
    pub fn dispatch(&self, job: FanOutJob) -> bool {
        let actor = job.actor;
        let res = {
            let queues = self.queues.read().expect("Locking failed");
            if queues.is_empty() {
                None
            } else {
                Some(queues[Self::shard(job.actor, queues.len())].try_send(job))
            }
        };

        match res {
            Some(Ok(())) => {
                Counters::inc(&self.counters.enqueued, 1);
                true
            }
            Some(Err(mpsc::error::TrySendError::Full(job))) => {
                Counters::inc(&self.counters.dropped, 1);
                warn!(
                    target: LOG_TARGET,
                    actor = %job.actor,
                    kind = %job.event.kind(),
                    "Fan-out queue full, dropping event"
                );
                false
            }
            Some(Err(mpsc::error::TrySendError::Closed(job))) => {
                Counters::inc(&self.counters.dropped, 1);
                warn!(
                    target: LOG_TARGET,
                    actor = %job.actor,
                    kind = %job.event.kind(),
                    "Fan-out worker gone, dropping event"
                );
                false
            }
            None => {
                Counters::inc(&self.counters.dropped, 1);
                debug!(target: LOG_TARGET, actor = %actor, "Fan-out shut down, dropping event");
                false
            }
        }
    }

    fn shard(actor: UserId, n: usize) -> usize {
        let bytes = actor.to_bytes();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&bytes[..8]);
        (u64::from_be_bytes(prefix) % n as u64) as usize
    }

    pub fn stats(&self) -> FanOutStats {
        let backlog = self
            .queues
            .read()
            .expect("Locking failed")
            .iter()
            .map(|tx| (tx.max_capacity() - tx.capacity()) as u64)
            .sum();
        let c = &self.counters;
        FanOutStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            mailbox_full: c.mailbox_full.load(Ordering::Relaxed),
            backlog,
        }
    }

    /// Stop accepting jobs and wait for the workers to finish queued ones
    pub async fn shutdown(&self) {
        self.queues.write().expect("Locking failed").clear();
        let workers = std::mem::take(&mut *self.workers.lock().expect("Locking failed"));

        for worker in workers {
            if let Err(err) = worker.await {
                warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Fan-out worker failed");
            }
        }
        info!(target: LOG_TARGET, "Fan-out stopped");
    }
}

struct FanOutWorker {
    worker_id: usize,
    rx: mpsc::Receiver<FanOutJob>,
    resolver: Arc<dyn IdentityResolver>,
    registry: Arc<SubscriberRegistry>,
    counters: Arc<Counters>,
}

impl FanOutWorker {
    /// Run the thread
    #[instrument(name = "fanout-worker", skip(self), fields(worker_id = self.worker_id), ret)]
    async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            match fan_out(self.resolver.as_ref(), &self.registry, &job).await {
                Ok(report) => {
                    debug!(
                        target: LOG_TARGET,
                        actor = %job.actor,
                        kind = %job.event.kind(),
                        audience = report.audience,
                        delivered = report.delivered,
                        full = report.full,
                        "Event fanned out"
                    );
                    Counters::inc(&self.counters.completed, 1);
                    Counters::inc(&self.counters.delivered, report.delivered as u64);
                    Counters::inc(&self.counters.mailbox_full, report.full as u64);
                }
                Err(err) => {
                    Counters::inc(&self.counters.failed, 1);
                    warn!(
                        target: LOG_TARGET,
                        err = %err.fmt_compact(),
                        kind = %job.event.kind(),
                        "Fan-out abandoned"
                    );
                }
            }
        }
        debug!(target: LOG_TARGET, "Queue closed, worker quitting");
    }
}
