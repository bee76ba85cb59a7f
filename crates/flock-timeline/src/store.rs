use std::collections::BTreeSet;

use async_trait::async_trait;
use flock_core::{Post, PostId, Repost, RepostId, RepostParent, UserId};
use flock_db::{Database, DbError, DeletedUser, TIMELINE_LIMIT};
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(transparent)]
    Db { source: DbError },
    #[snafu(display("Store unavailable: {message}"))]
    Unavailable { message: String },
}
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Db { source } if source.is_not_found())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Db { source } if source.is_conflict())
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, StoreError::Db { source } if source.is_invalid())
    }
}

/// Where timeline content is persisted
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    async fn create_post(&self, user_id: UserId, text: &str) -> StoreResult<Post>;

    async fn delete_post(&self, post_id: PostId) -> StoreResult<Post>;

    async fn create_repost(
        &self,
        user_id: UserId,
        parent: RepostParent,
        quote: Option<&str>,
    ) -> StoreResult<Repost>;

    async fn delete_repost(&self, repost_id: RepostId) -> StoreResult<Repost>;

    /// Own and direct followees' posts, newest first
    async fn current_timeline(&self, user_id: UserId) -> StoreResult<Vec<Post>>;

    /// Remove an account with all it authored
    async fn delete_user(&self, user_id: UserId) -> StoreResult<DeletedUser>;
}

/// Who is who and who follows whom
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool>;

    /// Direct followers only, no transitive expansion
    async fn followers_of(&self, user_id: UserId) -> StoreResult<BTreeSet<UserId>>;

    /// Author of a repost parent, `None` if it no longer exists
    async fn parent_author(&self, parent: RepostParent) -> StoreResult<Option<UserId>>;
}

#[async_trait]
impl ContentStore for Database {
    async fn create_post(&self, user_id: UserId, text: &str) -> StoreResult<Post> {
        Ok(Database::create_post(self, user_id, text).await?)
    }

    async fn delete_post(&self, post_id: PostId) -> StoreResult<Post> {
        Ok(Database::delete_post(self, post_id).await?)
    }

    async fn create_repost(
        &self,
        user_id: UserId,
        parent: RepostParent,
        quote: Option<&str>,
    ) -> StoreResult<Repost> {
        Ok(Database::create_repost(self, user_id, parent, quote).await?)
    }

    async fn delete_repost(&self, repost_id: RepostId) -> StoreResult<Repost> {
        Ok(Database::delete_repost(self, repost_id).await?)
    }

    async fn current_timeline(&self, user_id: UserId) -> StoreResult<Vec<Post>> {
        Ok(Database::current_timeline(self, user_id, TIMELINE_LIMIT).await?)
    }

    async fn delete_user(&self, user_id: UserId) -> StoreResult<DeletedUser> {
        Ok(Database::delete_user(self, user_id).await?)
    }
}

#[async_trait]
impl IdentityResolver for Database {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        Ok(Database::user_exists(self, user_id).await?)
    }

    async fn followers_of(&self, user_id: UserId) -> StoreResult<BTreeSet<UserId>> {
        Ok(Database::followers_of(self, user_id).await?)
    }

    async fn parent_author(&self, parent: RepostParent) -> StoreResult<Option<UserId>> {
        Ok(Database::parent_author(self, parent).await?)
    }
}
