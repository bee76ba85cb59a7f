use crate::{Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct User {
    pub id: UserId,
    /// Unique, see [`crate::validate::username`]
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub is_private: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
