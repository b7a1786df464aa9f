//! Access ledger
//!
//! Authoritative record of which users may read which books. Grants are added
//! only by the request workflow when a request is approved, and removed only
//! when that approval is rolled back.

use crate::error::AccessResult;
use crate::model::{AccessGrant, BookId, RequestId, UserId};
use crate::store::SharedGrantStore;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Lookup and insert front for the grant store
pub struct AccessLedger {
    store: SharedGrantStore,
}

impl AccessLedger {
    pub fn new(store: SharedGrantStore) -> Self {
        Self { store }
    }

    /// True iff a grant exists for the pair
    pub async fn has_access(&self, user_id: &UserId, book_id: &BookId) -> AccessResult<bool> {
        let granted = self.store.contains(user_id, book_id).await?;
        debug!(user = %user_id, book = %book_id, granted, "Checked book access");
        Ok(granted)
    }

    /// Grant access to a book. Granting an already-granted pair is a no-op.
    ///
    /// Returns whether a new grant was recorded.
    pub async fn grant(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        request_id: RequestId,
    ) -> AccessResult<bool> {
        let grant = AccessGrant {
            user_id: user_id.clone(),
            book_id: book_id.clone(),
            granted_at: Utc::now(),
            request_id,
        };

        let inserted = self.store.insert_if_absent(grant).await?;
        if inserted {
            info!(user = %user_id, book = %book_id, request = %request_id, "Granted book access");
        } else {
            debug!(user = %user_id, book = %book_id, "Access already granted");
        }
        Ok(inserted)
    }

    /// Undo a grant recorded for `request_id`
    pub(crate) async fn withdraw(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        request_id: RequestId,
    ) -> AccessResult<()> {
        if self.store.withdraw(user_id, book_id, request_id).await? {
            warn!(user = %user_id, book = %book_id, request = %request_id, "Withdrew book access");
        }
        Ok(())
    }

    /// All grants held by a user, oldest first
    pub async fn grants_for(&self, user_id: &UserId) -> AccessResult<Vec<AccessGrant>> {
        Ok(self.store.list_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGrantStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let ledger = AccessLedger::new(Arc::new(MemoryGrantStore::new()));
        let (user, book) = (UserId::new("u1"), BookId::new("b1"));

        assert!(!ledger.has_access(&user, &book).await.unwrap());

        let first = RequestId::new();
        assert!(ledger.grant(&user, &book, first).await.unwrap());
        assert!(!ledger.grant(&user, &book, RequestId::new()).await.unwrap());

        assert!(ledger.has_access(&user, &book).await.unwrap());
        let grants = ledger.grants_for(&user).await.unwrap();
        assert_eq!(grants.len(), 1);
        // The first grant wins
        assert_eq!(grants[0].request_id, first);
    }
}
