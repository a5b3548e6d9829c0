//! A read-only JSON API over financial transactions stored in a search engine.
//!
//! Clients either page through a single user's transactions, or count every
//! transaction in a date range. Query parameters are validated into a
//! [transaction::QueryIntent], translated into a backend-agnostic
//! [transaction::SearchPredicate] and run against a [gateway::SearchBackend],
//! either as a single bounded page or by scrolling through the full result set.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod config;
pub mod endpoints;
mod error;
pub mod gateway;
mod logging;
mod pagination;
mod routing;
pub mod transaction;

pub use app_state::AppState;
pub use config::{Config, ConfigError};
pub use error::{Error, ErrorLog};
pub use logging::logging_middleware;
pub use pagination::{PageSize, PageWindow, PaginationConfig, resolve_page_window};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// In-flight requests get a short grace period, after which they are dropped
/// along with any backend calls they are waiting on.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(5)));
}
