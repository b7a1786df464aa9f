//! Persistence collaborators
//!
//! Each component owns exactly one store. The traits are the boundary to the
//! backing storage; [`memory`] provides the in-process implementation used by
//! the server and the tests.
//!
//! Stores are responsible for the atomic check-and-set steps of the workflow:
//! inserting a pending request only when the pair has none, and letting only
//! one resolution of a pending request go ahead.

pub mod memory;

pub use memory::{MemoryGrantStore, MemoryNotificationStore, MemoryRequestStore};

use crate::error::StoreResult;
use crate::model::{
    AccessGrant, AccessRequest, BookId, Notification, NotificationId, RequestId, RequestStatus,
    Resolution, UserId,
};
// async_trait required for dyn-compatibility with Arc<dyn ...Store>
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of inserting a pending request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The request was stored
    Inserted(AccessRequest),
    /// The pair already has a pending request; nothing was stored
    Conflict(AccessRequest),
}

/// Outcome of claiming a pending request for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller holds the claim; carries the request as it will read once committed
    Claimed(AccessRequest),
    /// No request with this id exists
    NotFound,
    /// The request has left `PENDING` or another resolution holds the claim.
    /// Carries the terminal form of the request.
    AlreadyResolved(AccessRequest),
}

/// Outcome of marking a notification read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkReadOutcome {
    /// The notification flipped from unread to read
    Marked(Notification),
    /// The notification was already read; nothing changed
    AlreadyRead(Notification),
    NotFound,
}

/// Storage for access requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Store a pending request unless the same (user, book) pair already has one.
    ///
    /// The check and the insert happen in one critical section.
    async fn insert_pending(&self, request: AccessRequest) -> StoreResult<InsertOutcome>;

    async fn get(&self, id: RequestId) -> StoreResult<Option<AccessRequest>>;

    /// Reserve a pending request for resolution.
    ///
    /// Read, compare against `PENDING` and reserve happen in one critical
    /// section, so at most one caller sees [`ClaimOutcome::Claimed`]. The
    /// request stays `PENDING` to readers and its pair stays taken until the
    /// claim is committed or released.
    async fn claim_resolution(
        &self,
        id: RequestId,
        resolution: &Resolution,
        librarian: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome>;

    /// Publish a claimed resolution and free the pair for new requests
    async fn commit_resolution(&self, id: RequestId) -> StoreResult<AccessRequest>;

    /// Drop a claim, leaving the request `PENDING`. Releasing an unclaimed id is a no-op.
    async fn release_claim(&self, id: RequestId) -> StoreResult<()>;

    /// Requests with the given status, in insertion order
    async fn list_by_status(&self, status: RequestStatus) -> StoreResult<Vec<AccessRequest>>;

    /// Requests submitted by a user, in insertion order
    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<AccessRequest>>;
}

/// Storage for access grants
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn contains(&self, user_id: &UserId, book_id: &BookId) -> StoreResult<bool>;

    /// Insert the grant unless the pair is already granted. Returns whether it was inserted.
    async fn insert_if_absent(&self, grant: AccessGrant) -> StoreResult<bool>;

    /// Remove the pair's grant if it came from `request_id`. Returns whether it was removed.
    ///
    /// Only used to undo a grant whose approval was rolled back.
    async fn withdraw(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        request_id: RequestId,
    ) -> StoreResult<bool>;

    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<AccessGrant>>;
}

/// Storage for notifications
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> StoreResult<()>;

    async fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>>;

    /// Delete a notification, returning it if it existed.
    ///
    /// Only used to retract the notice of a resolution that was abandoned.
    async fn remove(&self, id: NotificationId) -> StoreResult<Option<Notification>>;

    /// Flip `is_read` to true in one critical section
    async fn mark_read(&self, id: NotificationId) -> StoreResult<MarkReadOutcome>;

    /// Notifications for a user, in insertion order
    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Notification>>;

    async fn count_unread(&self, user_id: &UserId) -> StoreResult<usize>;
}

/// Shared handle types
pub type SharedRequestStore = Arc<dyn RequestStore>;
pub type SharedGrantStore = Arc<dyn GrantStore>;
pub type SharedNotificationStore = Arc<dyn NotificationStore>;
