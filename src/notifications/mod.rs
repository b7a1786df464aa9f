//! Notifications
//!
//! The dispatcher owns notifications and their read state. Clients can either
//! poll the unread count ([`UnreadPoller`]) or subscribe to [`FeedEvent`]s for
//! push-based invalidation.

pub mod dispatcher;
pub mod feed;
pub mod templates;

pub use dispatcher::{DEFAULT_CHANNEL_CAPACITY, FeedEvent, NotificationDispatcher};
pub use feed::{MIN_POLL_INTERVAL, UnreadPoller};
pub use templates::MessageTemplates;
