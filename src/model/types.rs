//! Access request, grant, and notification records

use crate::error::{AccessError, AccessResult};
use crate::model::ids::{BookId, NotificationId, RequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an access request
///
/// `Pending` is the only non-terminal state. A request moves out of it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// A librarian's terminal decision on a request
///
/// A rejection always carries its reason, so "reason required iff rejected"
/// holds by construction once the reason has passed [`Resolution::rejected`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Resolution {
    Approved,
    Rejected { reason: String },
}

impl Resolution {
    /// Build a rejection, refusing blank reasons
    pub fn rejected(reason: impl Into<String>) -> AccessResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(AccessError::validation(
                "rejection_reason",
                "a rejection must state a reason",
            ));
        }
        Ok(Resolution::Rejected { reason })
    }

    /// Build a resolution from the `approved` flag plus optional reason used on the wire
    ///
    /// The reason is ignored for approvals.
    pub fn from_decision(approved: bool, rejection_reason: Option<&str>) -> AccessResult<Self> {
        if approved {
            Ok(Resolution::Approved)
        } else {
            Self::rejected(rejection_reason.unwrap_or_default())
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Resolution::Approved)
    }

    /// Status a pending request ends in under this resolution
    pub fn status(&self) -> RequestStatus {
        match self {
            Resolution::Approved => RequestStatus::Approved,
            Resolution::Rejected { .. } => RequestStatus::Rejected,
        }
    }
}

/// A reader's request for access to one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub reason: String,
    pub status: RequestStatus,
    pub request_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl AccessRequest {
    /// Create a new pending request stamped with the current time
    pub fn pending(user_id: UserId, book_id: BookId, reason: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            user_id,
            book_id,
            reason: reason.into(),
            status: RequestStatus::Pending,
            request_date: Utc::now(),
            resolved_by: None,
            resolved_at: None,
            rejection_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// The resolved form of this request; the caller checks it is still pending
    pub fn resolved(
        &self,
        resolution: &Resolution,
        librarian: &UserId,
        at: DateTime<Utc>,
    ) -> AccessRequest {
        let mut resolved = self.clone();
        resolved.status = resolution.status();
        resolved.resolved_by = Some(librarian.clone());
        resolved.resolved_at = Some(at);
        resolved.rejection_reason = match resolution {
            Resolution::Approved => None,
            Resolution::Rejected { reason } => Some(reason.clone()),
        };
        resolved
    }
}

/// Standing permission for a user to read a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub user_id: UserId,
    pub book_id: BookId,
    pub granted_at: DateTime<Utc>,
    /// The approved request this grant came from
    pub request_id: RequestId,
}

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum NotificationType {
    Approval,
    Rejection,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Approval => f.write_str("APPROVAL"),
            NotificationType::Rejection => f.write_str("REJECTION"),
        }
    }
}

/// Back-reference from a notification to the request that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRequest {
    pub request_id: RequestId,
    pub book_id: BookId,
}

/// Message delivered to a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedRequest>,
}

impl Notification {
    /// Path a client should open when the notification is clicked
    ///
    /// Only approvals link anywhere: straight to the book that was unlocked.
    pub fn deep_link(&self) -> Option<String> {
        match (self.kind, &self.related) {
            (NotificationType::Approval, Some(related)) => {
                Some(format!("/books/{}", related.book_id))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_from_decision() {
        assert_eq!(
            Resolution::from_decision(true, None).unwrap(),
            Resolution::Approved
        );
        // Reason is ignored for approvals
        assert_eq!(
            Resolution::from_decision(true, Some("")).unwrap(),
            Resolution::Approved
        );
        assert_eq!(
            Resolution::from_decision(false, Some("out of stock")).unwrap(),
            Resolution::Rejected {
                reason: "out of stock".into()
            }
        );
    }

    #[test]
    fn test_rejection_requires_reason() {
        for reason in [None, Some(""), Some("   \t")] {
            let err = Resolution::from_decision(false, reason).unwrap_err();
            assert!(matches!(
                err,
                AccessError::Validation {
                    field: "rejection_reason",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_resolved_sets_fields() {
        let request = AccessRequest::pending("u1".into(), "b1".into(), "coursework");
        let now = Utc::now();

        let approved = request.resolved(&Resolution::Approved, &"lib1".into(), now);
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.resolved_by, Some(UserId::new("lib1")));
        assert_eq!(approved.resolved_at, Some(now));
        assert_eq!(approved.rejection_reason, None);
        assert_eq!(approved.request_date, request.request_date);

        let rejected = request.resolved(
            &Resolution::rejected("out of stock").unwrap(),
            &"lib1".into(),
            now,
        );
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("out of stock"));
    }

    #[test]
    fn test_request_json_shape() {
        let request = AccessRequest::pending("u1".into(), "b1".into(), "coursework");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["bookId"], "b1");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("resolvedBy").is_none());

        let back: AccessRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_notification_deep_link() {
        let related = RelatedRequest {
            request_id: RequestId::new(),
            book_id: "b1".into(),
        };
        let mut notification = Notification {
            id: NotificationId::new(),
            user_id: "u1".into(),
            kind: NotificationType::Approval,
            message: "approved".into(),
            created_at: Utc::now(),
            is_read: false,
            related: Some(related),
        };
        assert_eq!(notification.deep_link().as_deref(), Some("/books/b1"));

        notification.kind = NotificationType::Rejection;
        assert_eq!(notification.deep_link(), None);

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "REJECTION");
        assert_eq!(json["isRead"], false);
        assert_eq!(json["related"]["bookId"], "b1");
    }
}
