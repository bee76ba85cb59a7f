use std::sync::Arc;

use flock_core::{Post, PostId, Repost, RepostId, RepostParent, TimelineEvent, UserId};
use flock_db::DeletedUser;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::fanout::{FanOut, FanOutConfig, FanOutJob, FanOutStats};
use crate::registry::SubscriberRegistry;
use crate::session::{SessionResult, TimelineSession};
use crate::store::{ContentStore, IdentityResolver, StoreResult};

const LOG_TARGET: &str = "flock::timeline";

/// Timeline-affecting writes and the live subscriptions that observe them
///
/// Every write is persisted first. Only after it succeeded is an event
/// queued for fan-out, and the caller does not wait for the fan-out.
pub struct Timeline {
    store: Arc<dyn ContentStore>,
    resolver: Arc<dyn IdentityResolver>,
    registry: Arc<SubscriberRegistry>,
    fanout: FanOut,
    shutdown_tx: watch::Sender<bool>,
}

#[bon::bon]
impl Timeline {
    /// Start the fan-out workers; must be called within a Tokio runtime
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        store: Arc<dyn ContentStore>,
        resolver: Arc<dyn IdentityResolver>,
        #[builder(default)] fanout: FanOutConfig,
    ) -> Arc<Self> {
        let registry = SubscriberRegistry::new();
        let fanout = FanOut::start(resolver.clone(), registry.clone(), fanout);
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            store,
            resolver,
            registry,
            fanout,
            shutdown_tx,
        })
    }
}

impl Timeline {
    pub async fn create_post(&self, user_id: UserId, text: &str) -> StoreResult<Post> {
        let post = self.store.create_post(user_id, text).await?;
        debug!(target: LOG_TARGET, %user_id, post_id = %post.id, "Post created");

        self.fanout.dispatch(FanOutJob::new(
            user_id,
            TimelineEvent::post_created(post.clone()),
        ));
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: PostId) -> StoreResult<Post> {
        let post = self.store.delete_post(post_id).await?;
        debug!(target: LOG_TARGET, user_id = %post.user_id, %post_id, "Post deleted");

        self.fanout.dispatch(FanOutJob::new(
            post.user_id,
            TimelineEvent::post_deleted(post.clone()),
        ));
        Ok(post)
    }

    pub async fn create_repost(
        &self,
        user_id: UserId,
        parent: RepostParent,
        quote: Option<&str>,
    ) -> StoreResult<Repost> {
        let repost = self.store.create_repost(user_id, parent, quote).await?;
        debug!(target: LOG_TARGET, %user_id, repost_id = %repost.id, "Repost created");

        self.fanout.dispatch(
            FanOutJob::new(user_id, TimelineEvent::repost_created(repost.clone()))
                .also_notify_author_of(parent),
        );
        Ok(repost)
    }

    pub async fn delete_repost(&self, repost_id: RepostId) -> StoreResult<Repost> {
        let repost = self.store.delete_repost(repost_id).await?;
        debug!(target: LOG_TARGET, user_id = %repost.user_id, %repost_id, "Repost deleted");

        self.fanout.dispatch(
            FanOutJob::new(
                repost.user_id,
                TimelineEvent::repost_deleted(repost.clone()),
            )
            .also_notify_author_of(repost.parent),
        );
        Ok(repost)
    }

    /// Delete `user_id` with everything they authored
    ///
    /// Their own streams are closed. Their former followers get a deletion
    /// event for every removed post and repost, addressed to the followers
    /// captured by the delete since the follow edges are gone by then.
    pub async fn delete_user(&self, user_id: UserId) -> StoreResult<DeletedUser> {
        let deleted = self.store.delete_user(user_id).await?;
        let streams = self.registry.release_user(user_id);
        debug!(
            target: LOG_TARGET,
            %user_id,
            streams,
            posts = deleted.posts.len(),
            reposts = deleted.reposts.len(),
            "User deleted"
        );

        let followers = Arc::new(deleted.followers.clone());
        for post in &deleted.posts {
            self.fanout.dispatch(
                FanOutJob::new(user_id, TimelineEvent::post_deleted(post.clone()))
                    .with_followers(followers.clone()),
            );
        }
        for repost in &deleted.reposts {
            self.fanout.dispatch(
                FanOutJob::new(user_id, TimelineEvent::repost_deleted(repost.clone()))
                    .with_followers(followers.clone())
                    .also_notify_author_of(repost.parent),
            );
        }
        Ok(deleted)
    }

    /// Open a streaming session for `user_id`
    pub async fn subscribe(&self, user_id: UserId) -> SessionResult<TimelineSession> {
        TimelineSession::open(
            self.store.as_ref(),
            self.resolver.as_ref(),
            &self.registry,
            user_id,
            self.shutdown_tx.subscribe(),
        )
        .await
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn fanout_stats(&self) -> FanOutStats {
        self.fanout.stats()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// End all sessions, then let the fan-out workers finish queued jobs
    pub async fn shutdown(&self) {
        info!(target: LOG_TARGET, "Shutting down timeline");
        self.shutdown_tx.send_replace(true);
        self.fanout.shutdown().await;
    }
}
