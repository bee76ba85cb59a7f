use crate::{define_array_type_public, impl_base32_str, impl_random, impl_serde_via_str};

define_array_type_public!(
    /// Identity of a user account
    struct UserId, 16
);
impl_base32_str!(UserId);
impl_serde_via_str!(UserId);
impl_random!(UserId);

define_array_type_public!(struct PostId, 16);
impl_base32_str!(PostId);
impl_serde_via_str!(PostId);
impl_random!(PostId);

define_array_type_public!(
    /// Identity of a repost, plain or quote
    ///
    /// Lives in a separate namespace from [`PostId`]; a repost parent always
    /// says which one it points at.
    struct RepostId, 16
);
impl_base32_str!(RepostId);
impl_serde_via_str!(RepostId);
impl_random!(RepostId);
