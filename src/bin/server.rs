use std::net::SocketAddr;

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use transaction_viewer::{
    AppState, Config, build_router, gateway::ElasticBackend, graceful_shutdown,
};

#[tokio::main]
async fn main() {
    setup_logging();

    let config = Config::parse();
    let pagination_config = config
        .pagination()
        .expect("Invalid page size configuration");

    let backend = ElasticBackend::new(
        &config.elastic_host,
        &config.elastic_index,
        config.elastic_debug,
    )
    .expect("Could not create the Elasticsearch client");

    let backend = match backend.ping().await {
        Ok(version) => {
            tracing::info!(
                "Connected to Elasticsearch {version} at {}",
                config.elastic_host
            );
            Some(backend)
        }
        Err(error) => {
            tracing::error!(
                "Could not reach Elasticsearch at {}, queries will fail: {error}",
                config.elastic_host
            );
            None
        }
    };

    let state = AppState::new(backend, pagination_config, config.transaction_types());
    let router = add_tracing_layer(build_router(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
