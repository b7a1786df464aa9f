//! Stdio transport
//!
//! One JSON command per input line, one JSON response per output line, all
//! executed as the fixed session identity:
//!
//! ```text
//! > {"id": 1, "op": "submit_request", "bookId": "b1", "reason": "coursework"}
//! < {"id":1,"ok":true,"result":{...}}
//! > {"op": "resolve", "requestId": "...", "approved": false}
//! < {"ok":false,"error":{"error":"...","code":"VALIDATION_ERROR"}}
//! ```

use crate::error::{AccessError, TransportError};
use crate::error::http_mapper::ErrorResponse;
use crate::gateway::AccessGateway;
use crate::model::{NotificationId, RequestId, Resolution};
use crate::session::{BoxedSessionProvider, Identity, SessionProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// A command read from one input line
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    RequestOrRead { book_id: String },
    #[serde(rename_all = "camelCase")]
    HasAccess {
        #[serde(default)]
        user_id: Option<String>,
        book_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SubmitRequest { book_id: String, reason: String },
    ListPending,
    #[serde(rename_all = "camelCase")]
    Resolve {
        request_id: String,
        approved: bool,
        #[serde(default)]
        rejection_reason: Option<String>,
    },
    MyRequests,
    MyGrants,
    Notifications {
        #[serde(default)]
        unread: bool,
    },
    UnreadCount,
    #[serde(rename_all = "camelCase")]
    MarkRead { notification_id: String },
    Metrics,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    /// Echoed back so clients can correlate responses
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    command: Command,
}

#[derive(Debug, Serialize)]
struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorResponse>,
}

impl Reply {
    fn from_outcome(id: Option<Value>, outcome: Result<Value, ErrorResponse>) -> Self {
        match outcome {
            Ok(result) => Self {
                id,
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                id,
                ok: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

fn bad_request(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse::new(message, "BAD_REQUEST")
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ErrorResponse> {
    serde_json::to_value(value).map_err(|e| ErrorResponse::new(e.to_string(), "INTERNAL_ERROR"))
}

/// Run one command against the gateway
pub async fn execute(
    gateway: &AccessGateway,
    identity: &Identity,
    command: Command,
) -> Result<Value, ErrorResponse> {
    let ids = gateway.ids();
    let access = |e: AccessError| ErrorResponse::from(&e);

    match command {
        Command::RequestOrRead { book_id } => {
            let book_id = ids.book_id(&book_id).map_err(access)?;
            to_value(gateway.request_or_read(identity, &book_id).await.map_err(access)?)
        }
        Command::HasAccess { user_id, book_id } => {
            let user_id = match user_id {
                Some(raw) => ids.user_id(&raw).map_err(|e| bad_request(e.to_string()))?,
                None => identity.user_id.clone(),
            };
            let book_id = ids.book_id(&book_id).map_err(access)?;
            to_value(
                gateway
                    .has_access(identity, &user_id, &book_id)
                    .await
                    .map_err(access)?,
            )
        }
        Command::SubmitRequest { book_id, reason } => {
            let book_id = ids.book_id(&book_id).map_err(access)?;
            to_value(
                gateway
                    .submit_request(identity, &book_id, &reason)
                    .await
                    .map_err(access)?,
            )
        }
        Command::ListPending => to_value(gateway.list_pending(identity).await.map_err(access)?),
        Command::Resolve {
            request_id,
            approved,
            rejection_reason,
        } => {
            let request_id: RequestId = request_id
                .parse()
                .map_err(|_| bad_request(format!("'{}' is not a valid request id", request_id)))?;
            let resolution = Resolution::from_decision(approved, rejection_reason.as_deref())
                .map_err(access)?;
            to_value(
                gateway
                    .resolve(identity, request_id, resolution)
                    .await
                    .map_err(access)?,
            )
        }
        Command::MyRequests => to_value(gateway.my_requests(identity).await.map_err(access)?),
        Command::MyGrants => to_value(gateway.my_grants(identity).await.map_err(access)?),
        Command::Notifications { unread } => {
            let list = if unread {
                gateway.unread_notifications(identity).await
            } else {
                gateway.notifications_for(identity).await
            };
            to_value(list.map_err(access)?)
        }
        Command::UnreadCount => to_value(gateway.unread_count(identity).await.map_err(access)?),
        Command::MarkRead { notification_id } => {
            let id: NotificationId = notification_id.parse().map_err(|_| {
                bad_request(format!(
                    "'{}' is not a valid notification id",
                    notification_id
                ))
            })?;
            to_value(
                gateway
                    .mark_notification_read(identity, id)
                    .await
                    .map_err(access)?,
            )
        }
        Command::Metrics => to_value(gateway.metrics().snapshot()),
    }
}

/// Serve commands from `reader` until end of input, writing replies to `writer`
pub async fn serve_lines<R, W>(
    gateway: &AccessGateway,
    identity: &Identity,
    reader: R,
    mut writer: W,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Envelope>(line) {
            Ok(Envelope { id, command }) => {
                debug!(?command, "Executing stdio command");
                Reply::from_outcome(id, execute(gateway, identity, command).await)
            }
            Err(e) => {
                warn!(error = %e, "Malformed stdio command");
                Reply::from_outcome(None, Err(bad_request(e.to_string())))
            }
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Run the gateway over standard input/output
pub async fn run_stdio(
    gateway: Arc<AccessGateway>,
    session: BoxedSessionProvider,
) -> anyhow::Result<()> {
    let identity = session.identity().await?;
    info!(
        user = %identity.user_id,
        role = %identity.role,
        source = session.source(),
        "Starting bookgate with stdio transport"
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(&gateway, &identity, stdin, stdout).await?;

    info!("Stdio input closed, stopping");
    Ok(())
}
