use std::collections::BTreeSet;

use flock_core::{Timestamp, UserId};
use redb_bincode::ReadableTable as _;

use super::{Database, DbResult, UserNotFoundSnafu};
use crate::tables::*;

impl Database {
    pub(crate) fn ensure_user_exists_tx(
        user_id: UserId,
        users_table: &impl users::ReadableTable,
    ) -> DbResult<()> {
        if users_table.get(&user_id)?.is_none() {
            return UserNotFoundSnafu { user_id }.fail();
        }
        Ok(())
    }

    pub(crate) fn has_edge_tx(
        from: UserId,
        to: UserId,
        fwd_table: &impl ids_followees::ReadableTable,
    ) -> DbResult<bool> {
        Ok(fwd_table.get(&(from, to))?.is_some())
    }

    /// Ids on the far side of all edges starting at `id`
    pub(crate) fn read_edges_tx(
        id: UserId,
        table: &impl ids_followees::ReadableTable,
    ) -> DbResult<BTreeSet<UserId>> {
        Ok(table
            .range((id, UserId::ZERO)..=(id, UserId::MAX))?
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<BTreeSet<_>, _>>()?)
    }

    /// Insert `from -> to` into both directions
    ///
    /// Returns `false` if it was already there.
    pub(crate) fn insert_edge_tx(
        from: UserId,
        to: UserId,
        ts: Timestamp,
        fwd_table: &mut EdgeTable,
        rev_table: &mut EdgeTable,
    ) -> DbResult<bool> {
        if fwd_table.get(&(from, to))?.is_some() {
            return Ok(false);
        }
        let record = EdgeRecord { ts };
        fwd_table.insert(&(from, to), &record)?;
        rev_table.insert(&(to, from), &record)?;
        Ok(true)
    }

    /// Remove `from -> to` from both directions
    ///
    /// Returns `false` if it was not there.
    pub(crate) fn remove_edge_tx(
        from: UserId,
        to: UserId,
        fwd_table: &mut EdgeTable,
        rev_table: &mut EdgeTable,
    ) -> DbResult<bool> {
        let existed = fwd_table.remove(&(from, to))?.is_some();
        rev_table.remove(&(to, from))?;
        Ok(existed)
    }

    /// Remove every edge touching `id`, in both directions
    pub(crate) fn remove_all_edges_tx(
        id: UserId,
        fwd_table: &mut EdgeTable,
        rev_table: &mut EdgeTable,
    ) -> DbResult<()> {
        for to in Self::read_edges_tx(id, &*fwd_table)? {
            Self::remove_edge_tx(id, to, fwd_table, rev_table)?;
        }
        for from in Self::read_edges_tx(id, &*rev_table)? {
            Self::remove_edge_tx(from, id, fwd_table, rev_table)?;
        }
        Ok(())
    }
}
