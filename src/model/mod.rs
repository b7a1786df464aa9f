//! Domain model
//!
//! Identifiers and the three records the workflow revolves around:
//! access requests, access grants, and notifications.

pub mod ids;
pub mod types;

pub use ids::{BookId, NotificationId, RequestId, UserId};
pub use types::{
    AccessGrant, AccessRequest, Notification, NotificationType, RelatedRequest, RequestStatus,
    Resolution,
};
