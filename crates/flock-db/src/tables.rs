use bincode::{Decode, Encode};
use flock_core::{Post, PostId, Repost, RepostId, RepostParent, Timestamp, User, UserId};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb_bincode::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb_bincode::ReadableTable<Key, Value> {}
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

// USERS
def_table!(users: UserId => User);
def_table! {
    /// Unique index of [`User::username`]
    users_by_username: String => UserId
}

// CONTENT
def_table!(posts: PostId => Post);
def_table!(posts_by_user: (UserId, Timestamp, PostId) => ());
def_table!(reposts: RepostId => Repost);
def_table!(reposts_by_user: (UserId, Timestamp, RepostId) => ());
def_table! {
    /// Plain (non-quote) reposts, at most one per user and parent
    reposts_plain: (UserId, RepostParent) => RepostId
}
def_table!(likes: (PostId, UserId) => EdgeRecord);
def_table!(likes_by_user: (UserId, PostId) => ());

// RELATIONS
//
// Each relation is stored twice, `(source, target)` in the forward table and
// `(target, source)` in the reverse one, so both sides can be listed by range.
def_table!(ids_followees: (UserId, UserId) => EdgeRecord);
def_table!(ids_followers: (UserId, UserId) => EdgeRecord);
def_table!(ids_mutes: (UserId, UserId) => EdgeRecord);
def_table!(ids_muted_by: (UserId, UserId) => EdgeRecord);
def_table!(ids_blocks: (UserId, UserId) => EdgeRecord);
def_table!(ids_blocked_by: (UserId, UserId) => EdgeRecord);

/// A relation between two ids, and when it was established
#[derive(Debug, Encode, Decode, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub ts: Timestamp,
}

/// Relation tables share a shape, so the edge helpers work on any of them
pub type EdgeTable<'a> = redb_bincode::Table<'a, (UserId, UserId), EdgeRecord>;
pub type EdgeTableDefinition<'a> = redb_bincode::TableDefinition<'a, (UserId, UserId), EdgeRecord>;
