//! Middleware for logging requests and responses.

use axum::{
    extract::Request,
    http::{HeaderMap, header::USER_AGENT},
    middleware::Next,
    response::Response,
};

use crate::error::ErrorLog;

/// Log the request and response for each request.
///
/// The request line and the response status are logged at the `info` level.
/// Error responses are also logged at the `error` level together with the
/// request they answer, unless the error is marked as not worth logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_agent = user_agent(request.headers()).to_owned();

    tracing::info!("Received request: {method} {uri}");

    let response = next.run(request).await;
    let status = response.status();

    if let Some(error_log) = response.extensions().get::<ErrorLog>()
        && error_log.should_log
    {
        tracing::error!(
            http.url = %uri,
            http.path = uri.path(),
            http.method = %method,
            http.user_agent = %user_agent,
            http.status = status.as_u16(),
            "{}",
            error_log.message
        );
    }

    tracing::info!("Sending response: {status} for {method} {uri}");

    response
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
