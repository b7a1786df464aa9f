//! Access-request workflow
//!
//! State machine taking a request from `PENDING` to `APPROVED` or `REJECTED`.
//!
//! Resolution is a single logical unit: the status transition, the grant (on
//! approval) and the requester's notification are either all kept or none are.
//! The request store first claims the request, which keeps it `PENDING` and its
//! pair reserved. The grant and the notification follow, and the new status is
//! published last. If any step fails, the earlier ones are undone and the
//! claim is released before the error is returned.

use crate::config::{DuplicatePolicy, WorkflowConfig};
use crate::error::{AccessError, AccessResult};
use crate::ledger::AccessLedger;
use crate::model::{
    AccessRequest, BookId, NotificationId, RelatedRequest, RequestId, RequestStatus, Resolution,
    UserId,
};
use crate::notifications::{MessageTemplates, NotificationDispatcher};
use crate::store::{ClaimOutcome, InsertOutcome, SharedRequestStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Coordinates requests, the ledger and the notification feed
pub struct RequestWorkflow {
    requests: SharedRequestStore,
    ledger: Arc<AccessLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    templates: MessageTemplates,
    config: WorkflowConfig,
}

impl RequestWorkflow {
    pub fn new(
        requests: SharedRequestStore,
        ledger: Arc<AccessLedger>,
        dispatcher: Arc<NotificationDispatcher>,
        templates: MessageTemplates,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            requests,
            ledger,
            dispatcher,
            templates,
            config,
        }
    }

    /// Submit a new request. The reason is stored trimmed.
    #[instrument(skip(self, reason), fields(user = %user_id, book = %book_id))]
    pub async fn submit(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        reason: &str,
    ) -> AccessResult<AccessRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AccessError::validation("reason", "a reason is required"));
        }
        let max = self.config.max_reason_length;
        if max > 0 && reason.chars().count() > max {
            return Err(AccessError::validation(
                "reason",
                format!("must be at most {} characters", max),
            ));
        }

        if self.config.reject_when_granted && self.ledger.has_access(user_id, book_id).await? {
            return Err(AccessError::AlreadyGranted {
                user_id: user_id.clone(),
                book_id: book_id.clone(),
            });
        }

        let request = AccessRequest::pending(user_id.clone(), book_id.clone(), reason);
        match self.requests.insert_pending(request).await? {
            InsertOutcome::Inserted(request) => {
                info!(request = %request.id, "Access request submitted");
                Ok(request)
            }
            InsertOutcome::Conflict(existing) => match self.config.duplicate_policy {
                DuplicatePolicy::Reject => Err(AccessError::DuplicateRequest {
                    user_id: user_id.clone(),
                    book_id: book_id.clone(),
                    existing: existing.id.to_string(),
                }),
                DuplicatePolicy::Fold => {
                    debug!(request = %existing.id, "Folded into existing pending request");
                    Ok(existing)
                }
            },
        }
    }

    /// Resolve a pending request.
    ///
    /// Of several concurrent calls for the same id, exactly one succeeds; the
    /// rest fail with `AlreadyResolved` and change nothing.
    #[instrument(
        skip(self, resolution),
        fields(librarian = %librarian, approved = resolution.is_approved())
    )]
    pub async fn resolve(
        &self,
        id: RequestId,
        librarian: &UserId,
        resolution: Resolution,
    ) -> AccessResult<AccessRequest> {
        // Re-check in case the variant was built directly
        let resolution = match resolution {
            Resolution::Rejected { reason } => Resolution::rejected(reason.trim())?,
            approved => approved,
        };

        let resolved = match self
            .requests
            .claim_resolution(id, &resolution, librarian, Utc::now())
            .await?
        {
            ClaimOutcome::Claimed(resolved) => resolved,
            ClaimOutcome::NotFound => return Err(AccessError::not_found("Request", id)),
            ClaimOutcome::AlreadyResolved(current) => {
                debug!(request = %id, status = %current.status, "Request already resolved");
                return Err(AccessError::AlreadyResolved {
                    id: id.to_string(),
                    status: current.status,
                });
            }
        };

        let mut undo = Undo {
            request: id,
            grant: false,
            notification: None,
        };

        if resolution.is_approved() {
            match self
                .ledger
                .grant(&resolved.user_id, &resolved.book_id, resolved.id)
                .await
            {
                Ok(inserted) => undo.grant = inserted,
                Err(e) => {
                    self.abandon(&resolved, undo).await;
                    return Err(e);
                }
            }
        }

        let (kind, message) = self.templates.render(&resolved, &resolution);
        let related = RelatedRequest {
            request_id: resolved.id,
            book_id: resolved.book_id.clone(),
        };
        match self
            .dispatcher
            .emit(&resolved.user_id, kind, message, Some(related))
            .await
        {
            Ok(notification) => undo.notification = Some(notification.id),
            Err(e) => {
                self.abandon(&resolved, undo).await;
                return Err(e);
            }
        }

        let resolved = match self.requests.commit_resolution(id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.abandon(&resolved, undo).await;
                return Err(e.into());
            }
        };

        info!(request = %resolved.id, status = %resolved.status, "Access request resolved");
        Ok(resolved)
    }

    /// Undo the effects of a resolution that could not be completed
    async fn abandon(&self, resolved: &AccessRequest, undo: Undo) {
        warn!(request = %undo.request, "Abandoning request resolution");

        if let Some(notification) = undo.notification
            && let Err(e) = self.dispatcher.retract(notification).await
        {
            error!(request = %undo.request, error = %e, "Failed to retract notification");
        }

        if undo.grant
            && let Err(e) = self
                .ledger
                .withdraw(&resolved.user_id, &resolved.book_id, resolved.id)
                .await
        {
            error!(request = %undo.request, error = %e, "Failed to withdraw grant");
        }

        if let Err(e) = self.requests.release_claim(undo.request).await {
            error!(request = %undo.request, error = %e, "Failed to release request claim");
        }
    }

    /// Pending requests, oldest first
    pub async fn list_pending(&self) -> AccessResult<Vec<AccessRequest>> {
        let mut list = self.requests.list_by_status(RequestStatus::Pending).await?;
        list.sort_by(|a, b| a.request_date.cmp(&b.request_date));
        Ok(list)
    }

    /// A reader's requests in any state, newest first
    pub async fn requests_for(&self, user_id: &UserId) -> AccessResult<Vec<AccessRequest>> {
        let mut list = self.requests.list_by_user(user_id).await?;
        list.reverse();
        list.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        Ok(list)
    }

    pub async fn get(&self, id: RequestId) -> AccessResult<AccessRequest> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| AccessError::not_found("Request", id))
    }
}

/// Effects of an in-progress resolution that must be undone if it fails
struct Undo {
    request: RequestId,
    /// The grant was created by this resolution
    grant: bool,
    notification: Option<NotificationId>,
}
