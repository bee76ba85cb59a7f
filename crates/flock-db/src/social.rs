use std::collections::BTreeSet;

use flock_core::{PostId, Timestamp, UserId};
use redb_bincode::ReadableTable as _;
use snafu::ensure;
use tracing::debug;

use super::{
    AlreadyExistsSnafu, BlockedSnafu, Database, DbResult, LOG_TARGET, PostNotFoundSnafu,
    RelationNotFoundSnafu, SelfRelationSnafu, WriteTransactionCtx,
};
use crate::tables::*;

impl Database {
    /// Insert a `from -> to` relation after checking both ends exist
    fn insert_relation_tx(
        tx: &WriteTransactionCtx,
        from: UserId,
        to: UserId,
        what: &'static str,
        fwd: &EdgeTableDefinition<'static>,
        rev: &EdgeTableDefinition<'static>,
    ) -> DbResult<()> {
        ensure!(from != to, SelfRelationSnafu { what });
        {
            let users_table = tx.open_table(&users::TABLE)?;
            Self::ensure_user_exists_tx(from, &users_table)?;
            Self::ensure_user_exists_tx(to, &users_table)?;
        }

        let inserted = Self::insert_edge_tx(
            from,
            to,
            Timestamp::now(),
            &mut tx.open_table(fwd)?,
            &mut tx.open_table(rev)?,
        )?;
        ensure!(inserted, AlreadyExistsSnafu { what });

        tx.on_commit(move || debug!(target: LOG_TARGET, %from, %to, what, "Relation added"));
        Ok(())
    }

    fn remove_relation_tx(
        tx: &WriteTransactionCtx,
        from: UserId,
        to: UserId,
        what: &'static str,
        fwd: &EdgeTableDefinition<'static>,
        rev: &EdgeTableDefinition<'static>,
    ) -> DbResult<()> {
        let removed =
            Self::remove_edge_tx(from, to, &mut tx.open_table(fwd)?, &mut tx.open_table(rev)?)?;
        ensure!(removed, RelationNotFoundSnafu { what });

        tx.on_commit(move || debug!(target: LOG_TARGET, %from, %to, what, "Relation removed"));
        Ok(())
    }

    async fn read_relations(
        &self,
        id: UserId,
        table: &EdgeTableDefinition<'static>,
    ) -> DbResult<BTreeSet<UserId>> {
        self.read_with(|tx| Self::read_edges_tx(id, &tx.open_table(table)?))
            .await
    }

    /// Start following `followee`
    ///
    /// Not allowed if either side blocks the other.
    pub async fn follow(&self, follower: UserId, followee: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            {
                let blocks_table = tx.open_table(&ids_blocks::TABLE)?;
                ensure!(
                    !Self::has_edge_tx(followee, follower, &blocks_table)?
                        && !Self::has_edge_tx(follower, followee, &blocks_table)?,
                    BlockedSnafu
                );
            }
            Self::insert_relation_tx(
                tx,
                follower,
                followee,
                "follow",
                &ids_followees::TABLE,
                &ids_followers::TABLE,
            )
        })
        .await
    }

    pub async fn unfollow(&self, follower: UserId, followee: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::remove_relation_tx(
                tx,
                follower,
                followee,
                "follow",
                &ids_followees::TABLE,
                &ids_followers::TABLE,
            )
        })
        .await
    }

    /// Users directly following `id`
    pub async fn followers_of(&self, id: UserId) -> DbResult<BTreeSet<UserId>> {
        self.read_relations(id, &ids_followers::TABLE).await
    }

    /// Users `id` directly follows
    pub async fn followees_of(&self, id: UserId) -> DbResult<BTreeSet<UserId>> {
        self.read_relations(id, &ids_followees::TABLE).await
    }

    pub async fn mute(&self, user_id: UserId, target: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::insert_relation_tx(
                tx,
                user_id,
                target,
                "mute",
                &ids_mutes::TABLE,
                &ids_muted_by::TABLE,
            )
        })
        .await
    }

    pub async fn unmute(&self, user_id: UserId, target: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::remove_relation_tx(
                tx,
                user_id,
                target,
                "mute",
                &ids_mutes::TABLE,
                &ids_muted_by::TABLE,
            )
        })
        .await
    }

    pub async fn mutes_of(&self, user_id: UserId) -> DbResult<BTreeSet<UserId>> {
        self.read_relations(user_id, &ids_mutes::TABLE).await
    }

    /// Block `target`, also dropping any follow between the two
    pub async fn block(&self, user_id: UserId, target: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::insert_relation_tx(
                tx,
                user_id,
                target,
                "block",
                &ids_blocks::TABLE,
                &ids_blocked_by::TABLE,
            )?;

            let mut followees_table = tx.open_table(&ids_followees::TABLE)?;
            let mut followers_table = tx.open_table(&ids_followers::TABLE)?;
            Self::remove_edge_tx(user_id, target, &mut followees_table, &mut followers_table)?;
            Self::remove_edge_tx(target, user_id, &mut followees_table, &mut followers_table)?;
            Ok(())
        })
        .await
    }

    pub async fn unblock(&self, user_id: UserId, target: UserId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::remove_relation_tx(
                tx,
                user_id,
                target,
                "block",
                &ids_blocks::TABLE,
                &ids_blocked_by::TABLE,
            )
        })
        .await
    }

    pub async fn blocks_of(&self, user_id: UserId) -> DbResult<BTreeSet<UserId>> {
        self.read_relations(user_id, &ids_blocks::TABLE).await
    }

    pub async fn like_post(&self, user_id: UserId, post_id: PostId) -> DbResult<()> {
        self.write_with(|tx| {
            Self::ensure_user_exists_tx(user_id, &tx.open_table(&users::TABLE)?)?;
            if tx.open_table(&posts::TABLE)?.get(&post_id)?.is_none() {
                return PostNotFoundSnafu { post_id }.fail();
            }

            let mut likes_table = tx.open_table(&likes::TABLE)?;
            ensure!(
                likes_table.get(&(post_id, user_id))?.is_none(),
                AlreadyExistsSnafu { what: "like" }
            );
            likes_table.insert(
                &(post_id, user_id),
                &EdgeRecord {
                    ts: Timestamp::now(),
                },
            )?;
            tx.open_table(&likes_by_user::TABLE)?
                .insert(&(user_id, post_id), &())?;
            Ok(())
        })
        .await
    }

    pub async fn unlike_post(&self, user_id: UserId, post_id: PostId) -> DbResult<()> {
        self.write_with(|tx| {
            let removed = tx
                .open_table(&likes::TABLE)?
                .remove(&(post_id, user_id))?
                .is_some();
            ensure!(removed, RelationNotFoundSnafu { what: "like" });
            tx.open_table(&likes_by_user::TABLE)?
                .remove(&(user_id, post_id))?;
            Ok(())
        })
        .await
    }

    pub async fn post_like_count(&self, post_id: PostId) -> DbResult<u64> {
        self.read_with(|tx| {
            let likes_table = tx.open_table(&likes::TABLE)?;
            let mut count = 0;
            for res in likes_table.range((post_id, UserId::ZERO)..=(post_id, UserId::MAX))? {
                res?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}
