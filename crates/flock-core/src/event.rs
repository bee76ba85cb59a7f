//! Timeline events pushed to live subscribers

use std::fmt;

use crate::{Post, Repost};

/// One timeline-affecting occurrence, with value copies of the affected items
///
/// The payload type follows from the variant, so a post event can never carry
/// reposts and vice versa. Incremental events built by the constructors below
/// always carry exactly one item; only a snapshot can be empty.
///
/// Serialized as `{"event_type": "post_created", "posts": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "event_type", rename_all = "snake_case")
)]
pub enum TimelineEvent {
    /// Current timeline, sent once when a subscription starts
    SnapshotDelivered { posts: Vec<Post> },
    PostCreated { posts: Vec<Post> },
    PostDeleted { posts: Vec<Post> },
    RepostCreated { reposts: Vec<Repost> },
    RepostDeleted { reposts: Vec<Repost> },
}

impl TimelineEvent {
    pub fn snapshot(posts: Vec<Post>) -> Self {
        Self::SnapshotDelivered { posts }
    }

    pub fn post_created(post: Post) -> Self {
        Self::PostCreated { posts: vec![post] }
    }

    pub fn post_deleted(post: Post) -> Self {
        Self::PostDeleted { posts: vec![post] }
    }

    pub fn repost_created(repost: Repost) -> Self {
        Self::RepostCreated {
            reposts: vec![repost],
        }
    }

    pub fn repost_deleted(repost: Repost) -> Self {
        Self::RepostDeleted {
            reposts: vec![repost],
        }
    }

    pub fn kind(&self) -> TimelineEventKind {
        match self {
            TimelineEvent::SnapshotDelivered { .. } => TimelineEventKind::SnapshotDelivered,
            TimelineEvent::PostCreated { .. } => TimelineEventKind::PostCreated,
            TimelineEvent::PostDeleted { .. } => TimelineEventKind::PostDeleted,
            TimelineEvent::RepostCreated { .. } => TimelineEventKind::RepostCreated,
            TimelineEvent::RepostDeleted { .. } => TimelineEventKind::RepostDeleted,
        }
    }

    /// Post payload, empty for repost events
    pub fn posts(&self) -> &[Post] {
        match self {
            TimelineEvent::SnapshotDelivered { posts }
            | TimelineEvent::PostCreated { posts }
            | TimelineEvent::PostDeleted { posts } => posts,
            TimelineEvent::RepostCreated { .. } | TimelineEvent::RepostDeleted { .. } => &[],
        }
    }

    /// Repost payload, empty for post events
    pub fn reposts(&self) -> &[Repost] {
        match self {
            TimelineEvent::RepostCreated { reposts } | TimelineEvent::RepostDeleted { reposts } => {
                reposts
            }
            TimelineEvent::SnapshotDelivered { .. }
            | TimelineEvent::PostCreated { .. }
            | TimelineEvent::PostDeleted { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineEventKind {
    SnapshotDelivered,
    PostCreated,
    PostDeleted,
    RepostCreated,
    RepostDeleted,
}

impl TimelineEventKind {
    /// Same as the `event_type` tag in the serialized event
    pub fn as_str(self) -> &'static str {
        match self {
            TimelineEventKind::SnapshotDelivered => "snapshot_delivered",
            TimelineEventKind::PostCreated => "post_created",
            TimelineEventKind::PostDeleted => "post_deleted",
            TimelineEventKind::RepostCreated => "repost_created",
            TimelineEventKind::RepostDeleted => "repost_deleted",
        }
    }
}

impl fmt::Display for TimelineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
