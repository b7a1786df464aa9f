//! In-memory stores
//!
//! Thread-safe stores backed by `std::sync::RwLock`. No lock is held across an
//! `.await`, so the std lock is fine inside async code.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    AccessGrant, AccessRequest, BookId, Notification, NotificationId, RequestId, RequestStatus,
    Resolution, UserId,
};
use crate::store::{
    ClaimOutcome, GrantStore, InsertOutcome, MarkReadOutcome, NotificationStore, RequestStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// Lock helpers that recover from poisoning by logging a warning and
// continuing with the data. Every critical section leaves the tables
// consistent before anything that could panic.

fn write_table<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!(store = name, "store lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn read_table<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!(store = name, "store lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[derive(Default)]
struct RequestTable {
    by_id: HashMap<RequestId, AccessRequest>,
    /// Insertion order
    order: Vec<RequestId>,
    /// The pending request of each (user, book) pair
    pending: HashMap<(UserId, BookId), RequestId>,
    /// Resolutions in progress, keyed by request, holding the terminal form
    claims: HashMap<RequestId, AccessRequest>,
}

impl RequestTable {
    fn ordered(&self) -> impl Iterator<Item = &AccessRequest> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// In-memory [`RequestStore`]
#[derive(Default)]
pub struct MemoryRequestStore {
    table: RwLock<RequestTable>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert_pending(&self, request: AccessRequest) -> StoreResult<InsertOutcome> {
        let mut table = write_table(&self.table, "requests");
        let key = (request.user_id.clone(), request.book_id.clone());

        if let Some(existing) = table.pending.get(&key).and_then(|id| table.by_id.get(id)) {
            return Ok(InsertOutcome::Conflict(existing.clone()));
        }

        table.pending.insert(key, request.id);
        table.order.push(request.id);
        table.by_id.insert(request.id, request.clone());
        Ok(InsertOutcome::Inserted(request))
    }

    async fn get(&self, id: RequestId) -> StoreResult<Option<AccessRequest>> {
        Ok(read_table(&self.table, "requests").by_id.get(&id).cloned())
    }

    async fn claim_resolution(
        &self,
        id: RequestId,
        resolution: &Resolution,
        librarian: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut table = write_table(&self.table, "requests");

        if let Some(claimed) = table.claims.get(&id) {
            return Ok(ClaimOutcome::AlreadyResolved(claimed.clone()));
        }
        let Some(current) = table.by_id.get(&id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if !current.is_pending() {
            return Ok(ClaimOutcome::AlreadyResolved(current.clone()));
        }

        let resolved = current.resolved(resolution, librarian, at);
        table.claims.insert(id, resolved.clone());
        Ok(ClaimOutcome::Claimed(resolved))
    }

    async fn commit_resolution(&self, id: RequestId) -> StoreResult<AccessRequest> {
        let mut table = write_table(&self.table, "requests");

        let Some(resolved) = table.claims.remove(&id) else {
            return Err(StoreError::Conflict(format!(
                "request {} has no resolution in progress",
                id
            )));
        };
        table
            .pending
            .remove(&(resolved.user_id.clone(), resolved.book_id.clone()));
        table.by_id.insert(id, resolved.clone());
        Ok(resolved)
    }

    async fn release_claim(&self, id: RequestId) -> StoreResult<()> {
        write_table(&self.table, "requests").claims.remove(&id);
        Ok(())
    }

    async fn list_by_status(&self, status: RequestStatus) -> StoreResult<Vec<AccessRequest>> {
        let table = read_table(&self.table, "requests");
        Ok(table
            .ordered()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<AccessRequest>> {
        let table = read_table(&self.table, "requests");
        Ok(table
            .ordered()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`GrantStore`]
#[derive(Default)]
pub struct MemoryGrantStore {
    grants: RwLock<HashMap<(UserId, BookId), AccessGrant>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn contains(&self, user_id: &UserId, book_id: &BookId) -> StoreResult<bool> {
        let grants = read_table(&self.grants, "grants");
        Ok(grants.contains_key(&(user_id.clone(), book_id.clone())))
    }

    async fn insert_if_absent(&self, grant: AccessGrant) -> StoreResult<bool> {
        let mut grants = write_table(&self.grants, "grants");
        let key = (grant.user_id.clone(), grant.book_id.clone());
        if grants.contains_key(&key) {
            return Ok(false);
        }
        grants.insert(key, grant);
        Ok(true)
    }

    async fn withdraw(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        request_id: RequestId,
    ) -> StoreResult<bool> {
        let mut grants = write_table(&self.grants, "grants");
        let key = (user_id.clone(), book_id.clone());
        if grants.get(&key).map(|g| g.request_id) != Some(request_id) {
            return Ok(false);
        }
        grants.remove(&key);
        Ok(true)
    }

    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<AccessGrant>> {
        let grants = read_table(&self.grants, "grants");
        let mut list: Vec<_> = grants
            .values()
            .filter(|g| &g.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.granted_at.cmp(&b.granted_at));
        Ok(list)
    }
}

#[derive(Default)]
struct NotificationTable {
    by_id: HashMap<NotificationId, Notification>,
    /// Per-recipient insertion order
    by_user: HashMap<UserId, Vec<NotificationId>>,
}

/// In-memory [`NotificationStore`]
#[derive(Default)]
pub struct MemoryNotificationStore {
    table: RwLock<NotificationTable>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: Notification) -> StoreResult<()> {
        let mut table = write_table(&self.table, "notifications");
        table
            .by_user
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.id);
        table.by_id.insert(notification.id, notification);
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(read_table(&self.table, "notifications")
            .by_id
            .get(&id)
            .cloned())
    }

    async fn remove(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let mut table = write_table(&self.table, "notifications");
        let Some(notification) = table.by_id.remove(&id) else {
            return Ok(None);
        };
        if let Some(ids) = table.by_user.get_mut(&notification.user_id) {
            ids.retain(|other| *other != id);
        }
        Ok(Some(notification))
    }

    async fn mark_read(&self, id: NotificationId) -> StoreResult<MarkReadOutcome> {
        let mut table = write_table(&self.table, "notifications");
        let Some(notification) = table.by_id.get_mut(&id) else {
            return Ok(MarkReadOutcome::NotFound);
        };
        if notification.is_read {
            return Ok(MarkReadOutcome::AlreadyRead(notification.clone()));
        }
        notification.is_read = true;
        Ok(MarkReadOutcome::Marked(notification.clone()))
    }

    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Notification>> {
        let table = read_table(&self.table, "notifications");
        Ok(table
            .by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| table.by_id.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_unread(&self, user_id: &UserId) -> StoreResult<usize> {
        let table = read_table(&self.table, "notifications");
        Ok(table
            .by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| table.by_id.get(id))
                    .filter(|n| !n.is_read)
                    .count()
            })
            .unwrap_or(0))
    }
}
