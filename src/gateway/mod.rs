//! # Provider Gateway
//!
//! Same-origin proxy routes for browser (or any same-origin) clients:
//! each `POST /api/<provider>` forwards a JSON request to the upstream
//! vendor API, injecting the API key and enforcing a per-route timeout,
//! then relays the raw vendor JSON or a `{ error, details }` envelope with
//! a status mirroring the failure.
//!
//! The gateway is stateless: no retries, no queueing, no circuit breaking.

use std::io;
use std::net::SocketAddr;

use log::info;

pub mod error;
pub mod routes;

pub use error::{ErrorBody, GatewayError};
pub use routes::{router, GatewayState};

/// Binds `addr` and serves the gateway until the task is dropped.
pub async fn serve(addr: SocketAddr, state: GatewayState) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on http://{}", addr);
    axum::serve(listener, router(state)).await
}
