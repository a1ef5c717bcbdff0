//! Defines routes for browsing and downloading code archives.
//!
//! ## Structure
//! - `GET /api/code/{key}/structure`    — file tree of an item's archive
//! - `GET /api/code/{key}/file/{*path}` — raw content of one file
//! - `GET /api/code/{key}/download`     — the original archive
//!
//! For `structure` and `file`, `key` is the catalog item key; for `download`
//! it is the archive key (its stored file name). The wildcard `*path` allows
//! nested paths like `src/components/Header.js`.

use crate::{
    handlers::{
        code_handlers::{download_archive, get_file_content, get_structure},
        health_handlers::{healthz, readyz},
        timeout::enforce_request_timeout,
    },
    services::code_service::CodeService,
};
use axum::{Router, middleware, routing::get};
use std::time::Duration;

/// Build and return the router for all code archive routes.
///
/// The router carries shared state (`CodeService`) to all handlers, and every
/// route is wrapped in the overall request timeout.
pub fn routes(request_timeout: Duration) -> Router<CodeService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Archive routes
        .route("/api/code/{key}/structure", get(get_structure))
        .route("/api/code/{key}/file/{*path}", get(get_file_content))
        .route("/api/code/{key}/download", get(download_archive))
        .layer(middleware::from_fn_with_state(
            request_timeout,
            enforce_request_timeout,
        ))
}
