use crate::{PostId, RepostId, Timestamp, UserId};

/// A post, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: Timestamp,
}

/// What a [`Repost`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", content = "id", rename_all = "snake_case")
)]
pub enum RepostParent {
    Post(PostId),
    Repost(RepostId),
}

/// A repost of a post or of another repost
///
/// A plain repost has empty `text`, a quote repost (`is_quote`) carries
/// the quoting text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Repost {
    pub id: RepostId,
    pub user_id: UserId,
    pub parent: RepostParent,
    pub is_quote: bool,
    pub text: String,
    pub created_at: Timestamp,
}
