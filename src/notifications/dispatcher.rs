//! Notification dispatcher

use crate::error::{AccessError, AccessResult};
use crate::model::{Notification, NotificationId, NotificationType, RelatedRequest, UserId};
use crate::store::{MarkReadOutcome, SharedNotificationStore};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default capacity of the feed event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Change to some user's notification feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FeedEvent {
    Created { notification: Notification },
    #[serde(rename_all = "camelCase")]
    Read {
        notification_id: NotificationId,
        user_id: UserId,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        notification_id: NotificationId,
        user_id: UserId,
    },
}

impl FeedEvent {
    /// The user whose feed changed
    pub fn user_id(&self) -> &UserId {
        match self {
            FeedEvent::Created { notification } => &notification.user_id,
            FeedEvent::Read { user_id, .. } | FeedEvent::Removed { user_id, .. } => user_id,
        }
    }
}

/// Creates notifications and tracks their read state
pub struct NotificationDispatcher {
    store: SharedNotificationStore,
    events: broadcast::Sender<FeedEvent>,
}

impl NotificationDispatcher {
    pub fn new(store: SharedNotificationStore) -> Self {
        Self::with_capacity(store, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a dispatcher whose event channel buffers `capacity` events per subscriber
    pub fn with_capacity(store: SharedNotificationStore, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { store, events }
    }

    /// Create and store a new unread notification for `user_id`
    pub async fn emit(
        &self,
        user_id: &UserId,
        kind: NotificationType,
        message: impl Into<String>,
        related: Option<RelatedRequest>,
    ) -> AccessResult<Notification> {
        let notification = Notification {
            id: NotificationId::new(),
            user_id: user_id.clone(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
            is_read: false,
            related,
        };

        self.store.insert(notification.clone()).await?;
        info!(
            user = %user_id,
            notification = %notification.id,
            kind = %kind,
            "Emitted notification"
        );

        // No subscribers is fine
        let _ = self.events.send(FeedEvent::Created {
            notification: notification.clone(),
        });

        Ok(notification)
    }

    pub async fn get(&self, id: NotificationId) -> AccessResult<Notification> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AccessError::not_found("Notification", id))
    }

    /// Notifications for a user, newest first
    pub async fn list_for(&self, user_id: &UserId) -> AccessResult<Vec<Notification>> {
        let mut list = self.store.list_by_user(user_id).await?;
        // Reverse first so equal timestamps keep newest-inserted first under the stable sort
        list.reverse();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    /// Unread notifications for a user, newest first
    pub async fn list_unread(&self, user_id: &UserId) -> AccessResult<Vec<Notification>> {
        let mut list = self.list_for(user_id).await?;
        list.retain(|n| !n.is_read);
        Ok(list)
    }

    pub async fn count_unread(&self, user_id: &UserId) -> AccessResult<usize> {
        Ok(self.store.count_unread(user_id).await?)
    }

    /// Mark a notification read. Marking an already-read notification is a no-op.
    pub async fn mark_read(&self, id: NotificationId) -> AccessResult<Notification> {
        match self.store.mark_read(id).await? {
            MarkReadOutcome::Marked(notification) => {
                debug!(
                    notification = %id,
                    user = %notification.user_id,
                    "Marked notification read"
                );
                let _ = self.events.send(FeedEvent::Read {
                    notification_id: id,
                    user_id: notification.user_id.clone(),
                });
                Ok(notification)
            }
            MarkReadOutcome::AlreadyRead(notification) => Ok(notification),
            MarkReadOutcome::NotFound => Err(AccessError::not_found("Notification", id)),
        }
    }

    /// Take back a notification whose resolution did not go through
    pub(crate) async fn retract(&self, id: NotificationId) -> AccessResult<()> {
        if let Some(notification) = self.store.remove(id).await? {
            warn!(notification = %id, user = %notification.user_id, "Retracted notification");
            let _ = self.events.send(FeedEvent::Removed {
                notification_id: id,
                user_id: notification.user_id,
            });
        }
        Ok(())
    }

    /// Subscribe to feed changes for all users
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryNotificationStore;
    use std::sync::Arc;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::new(MemoryNotificationStore::new()))
    }

    #[tokio::test]
    async fn test_emit_starts_unread() {
        let dispatcher = dispatcher();
        let user = UserId::new("u1");

        let n = dispatcher
            .emit(&user, NotificationType::Approval, "approved", None)
            .await
            .unwrap();

        assert!(!n.is_read);
        assert_eq!(n.user_id, user);
        assert_eq!(dispatcher.count_unread(&user).await.unwrap(), 1);
        assert_eq!(dispatcher.get(n.id).await.unwrap(), n);
    }

    #[tokio::test]
    async fn test_list_for_is_newest_first() {
        let dispatcher = dispatcher();
        let user = UserId::new("u1");

        let first = dispatcher
            .emit(&user, NotificationType::Approval, "first", None)
            .await
            .unwrap();
        let second = dispatcher
            .emit(&user, NotificationType::Rejection, "second", None)
            .await
            .unwrap();
        dispatcher
            .emit(&"u2".into(), NotificationType::Approval, "other", None)
            .await
            .unwrap();

        let list = dispatcher.list_for(&user).await.unwrap();
        let ids: Vec<_> = list.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let dispatcher = dispatcher();
        let user = UserId::new("u1");
        let n = dispatcher
            .emit(&user, NotificationType::Approval, "approved", None)
            .await
            .unwrap();

        let read = dispatcher.mark_read(n.id).await.unwrap();
        assert!(read.is_read);
        let again = dispatcher.mark_read(n.id).await.unwrap();
        assert_eq!(read, again);

        assert_eq!(dispatcher.count_unread(&user).await.unwrap(), 0);
        assert!(dispatcher.list_unread(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id() {
        let err = dispatcher()
            .mark_read(NotificationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_subscribers_see_created_and_read_once() {
        let dispatcher = dispatcher();
        let mut events = dispatcher.subscribe();
        let user = UserId::new("u1");

        let n = dispatcher
            .emit(&user, NotificationType::Approval, "approved", None)
            .await
            .unwrap();
        dispatcher.mark_read(n.id).await.unwrap();
        dispatcher.mark_read(n.id).await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            FeedEvent::Created {
                notification: n.clone()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            FeedEvent::Read {
                notification_id: n.id,
                user_id: user
            }
        );
        // The second mark_read was a no-op
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retract_removes_and_announces() {
        let dispatcher = dispatcher();
        let user = UserId::new("u1");
        let n = dispatcher
            .emit(&user, NotificationType::Rejection, "rejected", None)
            .await
            .unwrap();
        let mut events = dispatcher.subscribe();

        dispatcher.retract(n.id).await.unwrap();
        dispatcher.retract(n.id).await.unwrap();

        assert_eq!(dispatcher.count_unread(&user).await.unwrap(), 0);
        assert_eq!(
            events.recv().await.unwrap(),
            FeedEvent::Removed {
                notification_id: n.id,
                user_id: user
            }
        );
        assert!(events.try_recv().is_err());
    }
}
