//! Embedded storage of users, content and relations
mod migration_ops;
mod posts;
mod social;
mod tables;
mod timeline;
mod tx_ops;
mod users;

use std::path::{Path, PathBuf};
use std::{io, ops, result};

use flock_core::validate::ValidationError;
use flock_core::{PostId, RepostId, UserId};
use redb_bincode::{ReadTransaction, WriteTransaction};
use snafu::{Location, ResultExt as _, Snafu};
use tokio::task::JoinError;
use tracing::{debug, instrument};

pub use self::tables::*;
pub use self::users::{DeletedUser, NewUser, UserUpdate};

const LOG_TARGET: &str = "flock::db";

/// Most recent posts returned by a timeline query
pub const TIMELINE_LIMIT: usize = 200;

pub struct WriteTransactionCtx {
    dbtx: WriteTransaction,
    on_commit: std::sync::Mutex<Vec<Box<dyn FnOnce() + 'static>>>,
}

impl From<WriteTransaction> for WriteTransactionCtx {
    fn from(dbtx: WriteTransaction) -> Self {
        Self {
            dbtx,
            on_commit: std::sync::Mutex::new(vec![]),
        }
    }
}
impl ops::Deref for WriteTransactionCtx {
    type Target = WriteTransaction;

    fn deref(&self) -> &Self::Target {
        &self.dbtx
    }
}

impl WriteTransactionCtx {
    /// Run `f` only once the transaction is durably committed
    pub fn on_commit(&self, f: impl FnOnce() + 'static) {
        self.on_commit
            .lock()
            .expect("Locking failed")
            .push(Box::new(f));
    }

    fn commit(self) -> result::Result<(), redb::CommitError> {
        let Self { dbtx, on_commit } = self;

        dbtx.commit()?;

        for hook in on_commit.lock().expect("Locking failed").drain(..) {
            hook();
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DbError {
    Database {
        source: redb::DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Table {
        source: redb::TableError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Storage {
        source: redb::StorageError,
        #[snafu(implicit)]
        location: Location,
    },
    Transaction {
        source: redb::TransactionError,
        #[snafu(implicit)]
        location: Location,
    },
    Commit {
        source: redb::CommitError,
        #[snafu(implicit)]
        location: Location,
    },
    DbVersionTooHigh {
        db_ver: u64,
        code_ver: u64,
        #[snafu(implicit)]
        location: Location,
    },
    Join {
        source: JoinError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Invalid { source: ValidationError },
    #[snafu(display("User {user_id} not found"))]
    UserNotFound { user_id: UserId },
    #[snafu(display("Post {post_id} not found"))]
    PostNotFound { post_id: PostId },
    #[snafu(display("Repost {repost_id} not found"))]
    RepostNotFound { repost_id: RepostId },
    #[snafu(display("Username {username} already taken"))]
    UsernameTaken { username: String },
    #[snafu(display("This {what} already exists"))]
    AlreadyExists { what: &'static str },
    #[snafu(display("This {what} does not exist"))]
    RelationNotFound { what: &'static str },
    #[snafu(display("Can't {what} yourself"))]
    SelfRelation { what: &'static str },
    #[snafu(display("Blocked"))]
    Blocked,
}
pub type DbResult<T> = std::result::Result<T, DbError>;

impl DbError {
    /// A missing entity or relation, as opposed to a storage failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::UserNotFound { .. }
                | DbError::PostNotFound { .. }
                | DbError::RepostNotFound { .. }
                | DbError::RelationNotFound { .. }
        )
    }

    /// A request that conflicts with existing state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DbError::UsernameTaken { .. } | DbError::AlreadyExists { .. }
        )
    }

    /// A request rejected for its content, independent of stored state
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            DbError::Invalid { .. } | DbError::SelfRelation { .. } | DbError::Blocked
        )
    }
}

#[derive(Debug)]
pub struct Database {
    inner: redb_bincode::Database,
}

impl Database {
    pub async fn mk_db_path(data_dir: &Path) -> std::result::Result<PathBuf, io::Error> {
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(data_dir.join("flock.redb"))
    }

    #[instrument(skip_all)]
    pub async fn open(path: impl Into<PathBuf>) -> DbResult<Database> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening database");
        let inner = tokio::task::spawn_blocking(move || redb_bincode::Database::create(path))
            .await
            .context(JoinSnafu)?
            .context(DatabaseSnafu)?;

        Self::write_with_inner(&inner, |tx| {
            Self::init_tables_tx(tx)?;
            Self::handle_db_ver_migrations(tx)?;
            Ok(())
        })
        .await?;

        Ok(Self { inner })
    }

    pub async fn write_with_inner<T>(
        inner: &redb_bincode::Database,
        f: impl FnOnce(&'_ WriteTransactionCtx) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = WriteTransactionCtx::from(inner.begin_write().context(TransactionSnafu)?);
            let res = f(&dbtx)?;

            dbtx.commit().context(CommitSnafu)?;

            Ok(res)
        })
    }

    pub async fn write_with<T>(
        &self,
        f: impl FnOnce(&'_ WriteTransactionCtx) -> DbResult<T>,
    ) -> DbResult<T> {
        Self::write_with_inner(&self.inner, f).await
    }

    pub async fn read_with_inner<T>(
        inner: &redb_bincode::Database,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = inner.begin_read().context(TransactionSnafu)?;

            f(&dbtx)
        })
    }

    pub async fn read_with<T>(
        &self,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        Self::read_with_inner(&self.inner, f).await
    }
}
