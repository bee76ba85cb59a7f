use flock_core::{Post, PostId, Repost, RepostId, RepostParent, Timestamp, UserId, validate};
use redb_bincode::ReadableTable as _;
use snafu::OptionExt as _;
use tracing::debug;

use super::{
    AlreadyExistsSnafu, Database, DbResult, LOG_TARGET, PostNotFoundSnafu, RepostNotFoundSnafu,
};
use crate::tables::*;

impl Database {
    pub async fn create_post(&self, user_id: UserId, text: &str) -> DbResult<Post> {
        let text = validate::text(text)?;

        self.write_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;

            let post = Post {
                id: PostId::generate(),
                user_id,
                text,
                created_at: Timestamp::now(),
            };

            tx.open_table(&posts::TABLE)?.insert(&post.id, &post)?;
            tx.open_table(&posts_by_user::TABLE)?
                .insert(&(user_id, post.created_at, post.id), &())?;

            let post_id = post.id;
            tx.on_commit(move || debug!(target: LOG_TARGET, %post_id, %user_id, "Post created"));
            Ok(post)
        })
        .await
    }

    pub async fn get_post(&self, post_id: PostId) -> DbResult<Option<Post>> {
        self.read_with(|tx| {
            let posts_table = tx.open_table(&posts::TABLE)?;
            Ok(posts_table.get(&post_id)?.map(|g| g.value()))
        })
        .await
    }

    /// Delete a post and its likes
    ///
    /// Reposts of it are kept, their parent just stops resolving.
    pub async fn delete_post(&self, post_id: PostId) -> DbResult<Post> {
        self.write_with(|tx| {
            let post = Self::delete_post_tx(
                post_id,
                &mut tx.open_table(&posts::TABLE)?,
                &mut tx.open_table(&posts_by_user::TABLE)?,
                &mut tx.open_table(&likes::TABLE)?,
                &mut tx.open_table(&likes_by_user::TABLE)?,
            )?
            .context(PostNotFoundSnafu { post_id })?;

            tx.on_commit(move || debug!(target: LOG_TARGET, %post_id, "Post deleted"));
            Ok(post)
        })
        .await
    }

    pub(crate) fn delete_post_tx(
        post_id: PostId,
        posts_table: &mut posts::Table,
        posts_by_user_table: &mut posts_by_user::Table,
        likes_table: &mut likes::Table,
        likes_by_user_table: &mut likes_by_user::Table,
    ) -> DbResult<Option<Post>> {
        let Some(post) = posts_table.remove(&post_id)?.map(|g| g.value()) else {
            return Ok(None);
        };
        posts_by_user_table.remove(&(post.user_id, post.created_at, post.id))?;

        let likers = likes_table
            .range((post_id, UserId::ZERO)..=(post_id, UserId::MAX))?
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<Vec<_>, _>>()?;
        for liker in likers {
            likes_table.remove(&(post_id, liker))?;
            likes_by_user_table.remove(&(liker, post_id))?;
        }

        Ok(Some(post))
    }

    /// Posts of `user_id`, newest first
    pub async fn user_posts(&self, user_id: UserId, limit: usize) -> DbResult<Vec<Post>> {
        self.read_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;
            Self::read_user_posts_tx(
                user_id,
                limit,
                &tx.open_table(&posts_by_user::TABLE)?,
                &tx.open_table(&posts::TABLE)?,
            )
        })
        .await
    }

    pub(crate) fn read_user_posts_tx(
        user_id: UserId,
        limit: usize,
        posts_by_user_table: &impl posts_by_user::ReadableTable,
        posts_table: &impl posts::ReadableTable,
    ) -> DbResult<Vec<Post>> {
        let mut ret = vec![];

        for res in posts_by_user_table
            .range((user_id, Timestamp::ZERO, PostId::ZERO)..=(user_id, Timestamp::MAX, PostId::MAX))?
            .rev()
            .take(limit)
        {
            let (k, _) = res?;
            let (_, _, post_id) = k.value();
            if let Some(post) = posts_table.get(&post_id)?.map(|g| g.value()) {
                ret.push(post);
            }
        }

        Ok(ret)
    }

    /// Create a repost of a post or of another repost
    ///
    /// With `quote` set this is a quote repost, otherwise a plain one. A user
    /// can plainly repost the same parent only once.
    pub async fn create_repost(
        &self,
        user_id: UserId,
        parent: RepostParent,
        quote: Option<&str>,
    ) -> DbResult<Repost> {
        let quote = quote.map(validate::text).transpose()?;

        self.write_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;

            let mut reposts_table = tx.open_table(&reposts::TABLE)?;
            match parent {
                RepostParent::Post(post_id) => {
                    if tx.open_table(&posts::TABLE)?.get(&post_id)?.is_none() {
                        return PostNotFoundSnafu { post_id }.fail();
                    }
                }
                RepostParent::Repost(repost_id) => {
                    if reposts_table.get(&repost_id)?.is_none() {
                        return RepostNotFoundSnafu { repost_id }.fail();
                    }
                }
            }

            let is_quote = quote.is_some();
            let mut reposts_plain_table = tx.open_table(&reposts_plain::TABLE)?;
            if !is_quote && reposts_plain_table.get(&(user_id, parent))?.is_some() {
                return AlreadyExistsSnafu { what: "repost" }.fail();
            }

            let repost = Repost {
                id: RepostId::generate(),
                user_id,
                parent,
                is_quote,
                text: quote.unwrap_or_default(),
                created_at: Timestamp::now(),
            };

            reposts_table.insert(&repost.id, &repost)?;
            tx.open_table(&reposts_by_user::TABLE)?
                .insert(&(user_id, repost.created_at, repost.id), &())?;
            if !is_quote {
                reposts_plain_table.insert(&(user_id, parent), &repost.id)?;
            }

            let repost_id = repost.id;
            tx.on_commit(
                move || debug!(target: LOG_TARGET, %repost_id, %user_id, is_quote, "Repost created"),
            );
            Ok(repost)
        })
        .await
    }

    pub async fn get_repost(&self, repost_id: RepostId) -> DbResult<Option<Repost>> {
        self.read_with(|tx| {
            let reposts_table = tx.open_table(&reposts::TABLE)?;
            Ok(reposts_table.get(&repost_id)?.map(|g| g.value()))
        })
        .await
    }

    pub async fn delete_repost(&self, repost_id: RepostId) -> DbResult<Repost> {
        self.write_with(|tx| {
            let repost = Self::delete_repost_tx(
                repost_id,
                &mut tx.open_table(&reposts::TABLE)?,
                &mut tx.open_table(&reposts_by_user::TABLE)?,
                &mut tx.open_table(&reposts_plain::TABLE)?,
            )?
            .context(RepostNotFoundSnafu { repost_id })?;

            tx.on_commit(move || debug!(target: LOG_TARGET, %repost_id, "Repost deleted"));
            Ok(repost)
        })
        .await
    }

    pub(crate) fn delete_repost_tx(
        repost_id: RepostId,
        reposts_table: &mut reposts::Table,
        reposts_by_user_table: &mut reposts_by_user::Table,
        reposts_plain_table: &mut reposts_plain::Table,
    ) -> DbResult<Option<Repost>> {
        let Some(repost) = reposts_table.remove(&repost_id)?.map(|g| g.value()) else {
            return Ok(None);
        };
        reposts_by_user_table.remove(&(repost.user_id, repost.created_at, repost.id))?;
        if !repost.is_quote {
            reposts_plain_table.remove(&(repost.user_id, repost.parent))?;
        }
        Ok(Some(repost))
    }

    /// Reposts of `user_id`, newest first
    pub async fn user_reposts(&self, user_id: UserId, limit: usize) -> DbResult<Vec<Repost>> {
        self.read_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;

            let reposts_by_user_table = tx.open_table(&reposts_by_user::TABLE)?;
            let reposts_table = tx.open_table(&reposts::TABLE)?;
            let mut ret = vec![];

            for res in reposts_by_user_table
                .range(
                    (user_id, Timestamp::ZERO, RepostId::ZERO)
                        ..=(user_id, Timestamp::MAX, RepostId::MAX),
                )?
                .rev()
                .take(limit)
            {
                let (k, _) = res?;
                let (_, _, repost_id) = k.value();
                if let Some(repost) = reposts_table.get(&repost_id)?.map(|g| g.value()) {
                    ret.push(repost);
                }
            }

            Ok(ret)
        })
        .await
    }

    /// Author of whatever `parent` points at, if it still exists
    pub async fn parent_author(&self, parent: RepostParent) -> DbResult<Option<UserId>> {
        self.read_with(|tx| {
            Ok(match parent {
                RepostParent::Post(post_id) => tx
                    .open_table(&posts::TABLE)?
                    .get(&post_id)?
                    .map(|g| g.value().user_id),
                RepostParent::Repost(repost_id) => tx
                    .open_table(&reposts::TABLE)?
                    .get(&repost_id)?
                    .map(|g| g.value().user_id),
            })
        })
        .await
    }
}
