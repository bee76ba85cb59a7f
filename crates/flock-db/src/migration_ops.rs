use tracing::{debug, info};

use super::{Database, DbResult, DbVersionTooHighSnafu, LOG_TARGET, WriteTransactionCtx};
use crate::tables::*;

impl Database {
    pub(crate) fn init_tables_tx(tx: &WriteTransactionCtx) -> DbResult<()> {
        tx.open_table(&db_version::TABLE)?;

        tx.open_table(&users::TABLE)?;
        tx.open_table(&users_by_username::TABLE)?;

        tx.open_table(&posts::TABLE)?;
        tx.open_table(&posts_by_user::TABLE)?;
        tx.open_table(&reposts::TABLE)?;
        tx.open_table(&reposts_by_user::TABLE)?;
        tx.open_table(&reposts_plain::TABLE)?;
        tx.open_table(&likes::TABLE)?;
        tx.open_table(&likes_by_user::TABLE)?;

        tx.open_table(&ids_followees::TABLE)?;
        tx.open_table(&ids_followers::TABLE)?;
        tx.open_table(&ids_mutes::TABLE)?;
        tx.open_table(&ids_muted_by::TABLE)?;
        tx.open_table(&ids_blocks::TABLE)?;
        tx.open_table(&ids_blocked_by::TABLE)?;
        Ok(())
    }

    pub(crate) fn handle_db_ver_migrations(dbtx: &WriteTransactionCtx) -> DbResult<()> {
        const DB_VER: u64 = 0;

        let mut table_db_ver = dbtx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.first()?.map(|g| g.1.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &DB_VER)?;

            return Ok(());
        };

        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        debug!(target: LOG_TARGET, db_ver = %cur_db_ver, "Database schema up to date");
        Ok(())
    }
}
