use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flock_core::{RepostParent, TimelineEvent, UserId};
use flock_db::{Database, NewUser};
use flock_timeline::{
    FanOutConfig, IdentityResolver, StoreError, StoreResult, Timeline, TimelineSession,
};
use flock_util_error::BoxedErrorResult;
use tempfile::{TempDir, tempdir};
use tokio::sync::{Notify, Semaphore};

pub struct TestTimeline {
    pub db: Arc<Database>,
    pub timeline: Arc<Timeline>,
    _dir: TempDir,
}

impl TestTimeline {
    pub async fn new() -> BoxedErrorResult<Self> {
        Self::with_config(FanOutConfig::default()).await
    }

    pub async fn with_config(config: FanOutConfig) -> BoxedErrorResult<Self> {
        Self::open(config, |db| db).await
    }

    /// Resolve identities through `make_resolver` instead of the database
    pub async fn with_resolver<R: IdentityResolver>(
        make_resolver: impl FnOnce(Arc<Database>) -> Arc<R>,
    ) -> BoxedErrorResult<Self> {
        Self::open(FanOutConfig::default(), make_resolver).await
    }

    async fn open<R: IdentityResolver>(
        config: FanOutConfig,
        make_resolver: impl FnOnce(Arc<Database>) -> Arc<R>,
    ) -> BoxedErrorResult<Self> {
        let dir = tempdir()?;
        let db = Arc::new(Database::open(dir.path().join("flock.redb")).await?);
        let timeline = Timeline::builder()
            .store(db.clone())
            .resolver(make_resolver(db.clone()))
            .fanout(config)
            .build();

        Ok(Self {
            db,
            timeline,
            _dir: dir,
        })
    }

    pub async fn user(&self, username: &str) -> BoxedErrorResult<UserId> {
        Ok(self
            .db
            .create_user(NewUser {
                username: username.into(),
                ..Default::default()
            })
            .await?
            .id)
    }

    /// Wait until every dispatched job has been handled
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = self.timeline.fanout_stats();
                if stats.enqueued == stats.completed + stats.failed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Fan-out did not settle in time");
    }
}

pub async fn next_event(session: &mut TimelineSession) -> Arc<TimelineEvent> {
    tokio::time::timeout(Duration::from_secs(5), session.next_event())
        .await
        .expect("Timed out waiting for an event")
        .expect("Session closed")
}

/// Asserts nothing is pending, without waiting for live events to arrive
pub async fn assert_quiet(session: &mut TimelineSession) {
    if let Ok(event) = tokio::time::timeout(Duration::from_millis(100), session.next_event()).await
    {
        panic!("Unexpected event: {event:?}");
    }
}

/// Database identities, except that followers can't be resolved
pub struct FollowersUnavailable(pub Arc<Database>);

#[async_trait]
impl IdentityResolver for FollowersUnavailable {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        IdentityResolver::user_exists(self.0.as_ref(), user_id).await
    }

    async fn followers_of(&self, _user_id: UserId) -> StoreResult<BTreeSet<UserId>> {
        Err(StoreError::Unavailable {
            message: "follower index offline".into(),
        })
    }

    async fn parent_author(&self, parent: RepostParent) -> StoreResult<Option<UserId>> {
        IdentityResolver::parent_author(self.0.as_ref(), parent).await
    }
}

/// Lets one `parent_author` lookup through per added permit
pub struct Gate {
    pub entered: Notify,
    pub permits: Semaphore,
}

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            permits: Semaphore::new(0),
        })
    }
}

/// Database identities, with `parent_author` held by a [`Gate`]
pub struct GatedParentAuthor {
    pub db: Arc<Database>,
    pub gate: Arc<Gate>,
}

#[async_trait]
impl IdentityResolver for GatedParentAuthor {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        IdentityResolver::user_exists(self.db.as_ref(), user_id).await
    }

    async fn followers_of(&self, user_id: UserId) -> StoreResult<BTreeSet<UserId>> {
        IdentityResolver::followers_of(self.db.as_ref(), user_id).await
    }

    async fn parent_author(&self, parent: RepostParent) -> StoreResult<Option<UserId>> {
        self.gate.entered.notify_one();
        self.gate
            .permits
            .acquire()
            .await
            .expect("Semaphore not closed")
            .forget();
        IdentityResolver::parent_author(self.db.as_ref(), parent).await
    }
}
