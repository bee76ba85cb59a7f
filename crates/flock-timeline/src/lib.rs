//! Live timeline delivery
//!
//! Writes go through [`Timeline`], which persists them in a [`ContentStore`]
//! and then queues a [`FanOutJob`]. The [`FanOut`] workers resolve the
//! audience (the actor and their direct followers) with an
//! [`IdentityResolver`] and push the event into every open mailbox found in
//! the [`SubscriberRegistry`]. Each connected client drives one
//! [`TimelineSession`], which starts with a snapshot of the current timeline
//! and then forwards live events until it is closed.
mod fanout;
mod registry;
mod service;
mod session;
mod store;

pub use self::fanout::{
    FanOut, FanOutConfig, FanOutError, FanOutJob, FanOutReport, FanOutResult, FanOutStats,
    fan_out,
};
pub use self::registry::{DeliveryReport, SubscriberRegistry, Subscription, SubscriptionId};
pub use self::service::Timeline;
pub use self::session::{SessionError, SessionResult, SessionState, TimelineSession};
pub use self::store::{ContentStore, IdentityResolver, StoreError, StoreResult};
