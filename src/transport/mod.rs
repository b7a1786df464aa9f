//! Transport module
//!
//! Exposes the gateway over HTTP or over line-delimited JSON on stdio.

pub mod http;
pub mod stdio;

pub use http::{
    AppState, Caller, DEFAULT_HTTP_PORT, HttpConfig, HttpHandle, ServerInfo, router, run_http,
    run_http_blocking,
};
pub use stdio::{Command, execute, run_stdio, serve_lines};
