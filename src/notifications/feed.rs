//! Unread-count poller
//!
//! A caller-owned repeating task that keeps an unread badge current. It
//! refreshes on a fixed interval and, in between, whenever a feed event for the
//! watched user arrives. Cancelling the token (or dropping the poller) stops it.

use crate::model::UserId;
use crate::notifications::dispatcher::NotificationDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shortest refresh interval the poller accepts
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Background task publishing a user's unread notification count
pub struct UnreadPoller {
    counts: watch::Receiver<usize>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl UnreadPoller {
    /// Start polling. Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn spawn(
        dispatcher: Arc<NotificationDispatcher>,
        user_id: UserId,
        every: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let every = every.max(MIN_POLL_INTERVAL);
        let (tx, counts) = watch::channel(0usize);
        let mut events = dispatcher.subscribe();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut push = true;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                    event = events.recv(), if push => match event {
                        Ok(event) if event.user_id() == &user_id => {}
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(user = %user_id, skipped, "Feed subscriber lagged, refreshing");
                        }
                        Err(RecvError::Closed) => {
                            // Fall back to interval polling only
                            push = false;
                            continue;
                        }
                    },
                }

                match dispatcher.count_unread(&user_id).await {
                    Ok(count) => {
                        tx.send_replace(count);
                    }
                    Err(e) => warn!(user = %user_id, error = %e, "Failed to refresh unread count"),
                }
            }

            debug!(user = %user_id, "Unread poller stopped");
        });

        Self {
            counts,
            cancel,
            handle: Some(handle),
        }
    }

    /// Receiver that observes every published count
    pub fn counts(&self) -> watch::Receiver<usize> {
        self.counts.clone()
    }

    /// Most recently published count
    pub fn latest(&self) -> usize {
        *self.counts.borrow()
    }

    /// Cancel the task and wait for it to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Unread poller task failed");
        }
    }
}

impl Drop for UnreadPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationType;
    use crate::store::MemoryNotificationStore;
    use tokio::time::timeout;

    async fn wait_for(rx: &mut watch::Receiver<usize>, expected: usize) {
        timeout(Duration::from_secs(5), async {
            while *rx.borrow_and_update() != expected {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("unread count never reached expected value");
    }

    #[tokio::test]
    async fn test_poller_refreshes_on_push() {
        let dispatcher = Arc::new(NotificationDispatcher::new(Arc::new(
            MemoryNotificationStore::new(),
        )));
        let user = UserId::new("u1");
        let poller = UnreadPoller::spawn(
            dispatcher.clone(),
            user.clone(),
            Duration::from_secs(30),
            CancellationToken::new(),
        );
        let mut counts = poller.counts();

        let n = dispatcher
            .emit(&user, NotificationType::Approval, "approved", None)
            .await
            .unwrap();
        wait_for(&mut counts, 1).await;
        assert_eq!(poller.latest(), 1);

        dispatcher.mark_read(n.id).await.unwrap();
        wait_for(&mut counts, 0).await;

        poller.stop().await;
    }

    #[tokio::test]
    async fn test_poller_stops_on_cancel() {
        let dispatcher = Arc::new(NotificationDispatcher::new(Arc::new(
            MemoryNotificationStore::new(),
        )));
        let cancel = CancellationToken::new();
        let poller = UnreadPoller::spawn(
            dispatcher,
            UserId::new("u1"),
            Duration::from_millis(10),
            cancel.clone(),
        );

        cancel.cancel();
        timeout(Duration::from_secs(5), poller.stop())
            .await
            .expect("poller did not stop after cancellation");
    }
}
