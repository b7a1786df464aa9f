//! Bookgate
//!
//! Access-request workflow for restricted library books: readers ask for a
//! book, librarians approve or reject, and readers are notified of the outcome.
//!
//! ## Components
//!
//! ```text
//! AccessGateway → RequestWorkflow → AccessLedger
//!                                 → NotificationDispatcher
//! ```
//!
//! - [`ledger::AccessLedger`]: which users may read which books
//! - [`workflow::RequestWorkflow`]: `PENDING` → `APPROVED` | `REJECTED`, once
//! - [`notifications::NotificationDispatcher`]: per-user feed with read state
//! - [`gateway::AccessGateway`]: role-checked façade used by the transports
//!
//! Each component owns one store behind a trait in [`store`]; the in-memory
//! stores are the default.
//!
//! ## Example Configuration
//!
//! ```toml
//! [server]
//! transport = "http"
//! port = 8080
//!
//! [workflow]
//! duplicate_policy = "reject"     # or "fold"
//! reject_when_granted = true
//!
//! [notifications]
//! poll_interval_secs = 30
//! rejection_template = "Your request to access {book_id} has been rejected: {reason}"
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod notifications;
pub mod session;
pub mod store;
pub mod transport;
pub mod util;
pub mod workflow;

// Re-export main types
pub use config::{AppConfig, load_config};
pub use error::{AccessError, AppError, Result};
pub use gateway::{AccessGateway, GatewayStores, ReadDecision};
pub use metrics::GatewayMetrics;
pub use session::{Identity, Role};
