#[cfg(feature = "bincode")]
pub mod bincode;
pub mod event;
pub mod id;
mod macros;
pub mod post;
pub mod timestamp;
pub mod user;
pub mod validate;

pub use self::event::{TimelineEvent, TimelineEventKind};
pub use self::id::{PostId, RepostId, UserId};
pub use self::post::{Post, Repost, RepostParent};
pub use self::timestamp::Timestamp;
pub use self::user::User;
