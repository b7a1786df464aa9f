//! Notification message templates
//!
//! Placeholders: `{book_id}`, `{request_id}`, `{user_id}`, `{reason}`.
//! `{reason}` expands to the rejection reason and is empty for approvals.

use crate::config::NotificationConfig;
use crate::model::{AccessRequest, NotificationType, Resolution};

pub const DEFAULT_APPROVAL_TEMPLATE: &str = "Your request to access {book_id} has been approved.";
pub const DEFAULT_REJECTION_TEMPLATE: &str =
    "Your request to access {book_id} has been rejected: {reason}";

/// Renders the message sent to a requester once their request is resolved
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    approval: String,
    rejection: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_TEMPLATE, DEFAULT_REJECTION_TEMPLATE)
    }
}

impl MessageTemplates {
    pub fn new(approval: impl Into<String>, rejection: impl Into<String>) -> Self {
        Self {
            approval: approval.into(),
            rejection: rejection.into(),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(&config.approval_template, &config.rejection_template)
    }

    /// Notification type and message for a request resolved by `resolution`
    pub fn render(
        &self,
        request: &AccessRequest,
        resolution: &Resolution,
    ) -> (NotificationType, String) {
        let kind = if resolution.is_approved() {
            NotificationType::Approval
        } else {
            NotificationType::Rejection
        };
        (kind, self.fill(kind, request))
    }

    fn fill(&self, kind: NotificationType, request: &AccessRequest) -> String {
        let template = match kind {
            NotificationType::Approval => &self.approval,
            NotificationType::Rejection => &self.rejection,
        };

        template
            .replace("{book_id}", request.book_id.as_str())
            .replace("{request_id}", &request.id.to_string())
            .replace("{user_id}", request.user_id.as_str())
            .replace(
                "{reason}",
                request.rejection_reason.as_deref().unwrap_or_default(),
            )
    }
}
