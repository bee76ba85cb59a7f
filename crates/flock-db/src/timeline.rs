use std::iter;

use flock_core::{Post, UserId};

use super::{Database, DbResult};
use crate::tables::*;

impl Database {
    /// Posts by `user_id` and by everyone they directly follow, newest first
    pub async fn current_timeline(&self, user_id: UserId, limit: usize) -> DbResult<Vec<Post>> {
        self.read_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;

            let followees = Self::read_edges_tx(user_id, &tx.open_table(&ids_followees::TABLE)?)?;
            let posts_by_user_table = tx.open_table(&posts_by_user::TABLE)?;
            let posts_table = tx.open_table(&posts::TABLE)?;

            let mut ret = vec![];
            // Each author contributes at most `limit`, so the merge below
            // can't miss anything that belongs in the first `limit`
            for author in iter::once(user_id).chain(followees) {
                ret.extend(Self::read_user_posts_tx(
                    author,
                    limit,
                    &posts_by_user_table,
                    &posts_table,
                )?);
            }

            ret.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            ret.truncate(limit);
            Ok(ret)
        })
        .await
    }
}
