//! Access gateway
//!
//! The façade every transport calls. Each operation takes the caller's
//! [`Identity`] explicitly, enforces the role it needs, delegates to one
//! component, and records the call in [`GatewayMetrics`].

use crate::config::AppConfig;
use crate::error::{AccessError, AccessResult, ConfigError};
use crate::ledger::AccessLedger;
use crate::metrics::GatewayMetrics;
use crate::model::{
    AccessGrant, AccessRequest, BookId, Notification, NotificationId, RequestId, Resolution,
    UserId,
};
use crate::notifications::{FeedEvent, MessageTemplates, NotificationDispatcher, UnreadPoller};
use crate::session::{IdValidator, Identity};
use crate::store::{
    MemoryGrantStore, MemoryNotificationStore, MemoryRequestStore, SharedGrantStore,
    SharedNotificationStore, SharedRequestStore,
};
use crate::workflow::RequestWorkflow;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the client should do when a reader opens a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadDecision {
    ProceedToRead,
    ShowRequestForm,
}

/// The three backing stores, one per component
#[derive(Clone)]
pub struct GatewayStores {
    pub requests: SharedRequestStore,
    pub grants: SharedGrantStore,
    pub notifications: SharedNotificationStore,
}

impl GatewayStores {
    pub fn in_memory() -> Self {
        Self {
            requests: Arc::new(MemoryRequestStore::new()),
            grants: Arc::new(MemoryGrantStore::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
        }
    }
}

/// Entry point for readers and librarians
pub struct AccessGateway {
    workflow: RequestWorkflow,
    ledger: Arc<AccessLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    ids: IdValidator,
    metrics: Arc<GatewayMetrics>,
    poll_interval: Duration,
}

impl AccessGateway {
    /// Build a gateway over in-memory stores
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::with_stores(config, GatewayStores::in_memory())
    }

    pub fn with_stores(config: &AppConfig, stores: GatewayStores) -> Result<Self, ConfigError> {
        let ids = IdValidator::new(&config.session.id_pattern)?;
        let ledger = Arc::new(AccessLedger::new(stores.grants));
        let dispatcher = Arc::new(NotificationDispatcher::with_capacity(
            stores.notifications,
            config.notifications.channel_capacity,
        ));
        let workflow = RequestWorkflow::new(
            stores.requests,
            ledger.clone(),
            dispatcher.clone(),
            MessageTemplates::from_config(&config.notifications),
            config.workflow.clone(),
        );

        Ok(Self {
            workflow,
            ledger,
            dispatcher,
            ids,
            metrics: Arc::new(GatewayMetrics::new()),
            poll_interval: Duration::from_secs(config.notifications.poll_interval_secs),
        })
    }

    /// Validator for ids arriving from transports
    pub fn ids(&self) -> &IdValidator {
        &self.ids
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.metrics.clone()
    }

    async fn observe<T, F>(
        &self,
        operation: &'static str,
        identity: &Identity,
        call: F,
    ) -> AccessResult<T>
    where
        F: Future<Output = AccessResult<T>>,
    {
        let start = Instant::now();
        let result = call.await;
        let code = result.as_ref().err().map(AccessError::code);
        if let Some(code) = code {
            debug!(operation, user = %identity.user_id, code, "Gateway call failed");
        }
        self.metrics
            .record(operation, identity.user_id.as_str(), start.elapsed(), code);
        result
    }

    /// Decide whether the caller can open a book or must ask for it first
    pub async fn request_or_read(
        &self,
        identity: &Identity,
        book_id: &BookId,
    ) -> AccessResult<ReadDecision> {
        self.observe("request_or_read", identity, async {
            if self.ledger.has_access(&identity.user_id, book_id).await? {
                Ok(ReadDecision::ProceedToRead)
            } else {
                Ok(ReadDecision::ShowRequestForm)
            }
        })
        .await
    }

    /// Whether `user_id` may read `book_id`. Readers may only ask about themselves.
    pub async fn has_access(
        &self,
        identity: &Identity,
        user_id: &UserId,
        book_id: &BookId,
    ) -> AccessResult<bool> {
        self.observe("has_access", identity, async {
            if &identity.user_id != user_id {
                identity.require_librarian("checking another user's access")?;
            }
            self.ledger.has_access(user_id, book_id).await
        })
        .await
    }

    /// Submit a request on the caller's behalf
    pub async fn submit_request(
        &self,
        identity: &Identity,
        book_id: &BookId,
        reason: &str,
    ) -> AccessResult<AccessRequest> {
        self.observe("submit_request", identity, async {
            self.workflow.submit(&identity.user_id, book_id, reason).await
        })
        .await
    }

    pub async fn list_pending(&self, identity: &Identity) -> AccessResult<Vec<AccessRequest>> {
        self.observe("list_pending", identity, async {
            identity.require_librarian("listing pending requests")?;
            self.workflow.list_pending().await
        })
        .await
    }

    /// Resolve a request as the calling librarian
    pub async fn resolve(
        &self,
        identity: &Identity,
        request_id: RequestId,
        resolution: Resolution,
    ) -> AccessResult<AccessRequest> {
        self.observe("resolve", identity, async {
            identity.require_librarian("resolving requests")?;
            self.workflow
                .resolve(request_id, &identity.user_id, resolution)
                .await
        })
        .await
    }

    /// The caller's own requests, newest first
    pub async fn my_requests(&self, identity: &Identity) -> AccessResult<Vec<AccessRequest>> {
        self.observe("my_requests", identity, async {
            self.workflow.requests_for(&identity.user_id).await
        })
        .await
    }

    /// Books the caller has been granted, oldest grant first
    pub async fn my_grants(&self, identity: &Identity) -> AccessResult<Vec<AccessGrant>> {
        self.observe("my_grants", identity, async {
            self.ledger.grants_for(&identity.user_id).await
        })
        .await
    }

    /// The caller's notifications, newest first
    pub async fn notifications_for(&self, identity: &Identity) -> AccessResult<Vec<Notification>> {
        self.observe("notifications_for", identity, async {
            self.dispatcher.list_for(&identity.user_id).await
        })
        .await
    }

    pub async fn unread_notifications(
        &self,
        identity: &Identity,
    ) -> AccessResult<Vec<Notification>> {
        self.observe("unread_notifications", identity, async {
            self.dispatcher.list_unread(&identity.user_id).await
        })
        .await
    }

    pub async fn unread_count(&self, identity: &Identity) -> AccessResult<usize> {
        self.observe("unread_count", identity, async {
            self.dispatcher.count_unread(&identity.user_id).await
        })
        .await
    }

    /// Mark one of the caller's notifications read.
    ///
    /// Someone else's notification is reported as not found.
    pub async fn mark_notification_read(
        &self,
        identity: &Identity,
        id: NotificationId,
    ) -> AccessResult<Notification> {
        self.observe("mark_notification_read", identity, async {
            let notification = self.dispatcher.get(id).await?;
            if notification.user_id != identity.user_id {
                return Err(AccessError::not_found("Notification", id));
            }
            self.dispatcher.mark_read(id).await
        })
        .await
    }

    /// Feed changes for every user
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.dispatcher.subscribe()
    }

    /// Keep the caller's unread count current until `cancel` fires
    pub fn spawn_unread_poller(
        &self,
        identity: &Identity,
        cancel: CancellationToken,
    ) -> UnreadPoller {
        UnreadPoller::spawn(
            self.dispatcher.clone(),
            identity.user_id.clone(),
            self.poll_interval,
            cancel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationType;

    fn gateway() -> AccessGateway {
        AccessGateway::from_config(&AppConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_request_or_read_follows_ledger() {
        let gw = gateway();
        let reader = Identity::reader("u1");
        let librarian = Identity::librarian("lib1");
        let book = BookId::new("b1");

        assert_eq!(
            gw.request_or_read(&reader, &book).await.unwrap(),
            ReadDecision::ShowRequestForm
        );

        let request = gw.submit_request(&reader, &book, "coursework").await.unwrap();
        gw.resolve(&librarian, request.id, Resolution::Approved)
            .await
            .unwrap();

        assert_eq!(
            gw.request_or_read(&reader, &book).await.unwrap(),
            ReadDecision::ProceedToRead
        );
        let feed = gw.notifications_for(&reader).await.unwrap();
        assert_eq!(feed[0].kind, NotificationType::Approval);
    }

    #[tokio::test]
    async fn test_reader_cannot_resolve_or_list() {
        let gw = gateway();
        let reader = Identity::reader("u1");
        let request = gw
            .submit_request(&reader, &"b1".into(), "coursework")
            .await
            .unwrap();

        let err = gw
            .resolve(&reader, request.id, Resolution::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));
        assert!(matches!(
            gw.list_pending(&reader).await,
            Err(AccessError::Forbidden { .. })
        ));
        assert!(matches!(
            gw.has_access(&reader, &"u2".into(), &"b1".into()).await,
            Err(AccessError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let gw = gateway();
        let reader = Identity::reader("u1");
        gw.unread_count(&reader).await.unwrap();
        let _ = gw.list_pending(&reader).await;

        let snapshot = gw.metrics().snapshot();
        assert_eq!(snapshot.total_calls, 2);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.errors[0].code, "FORBIDDEN");
    }
}
