//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/users/{user_id}/transactions/', use [format_endpoint].

/// The root route which greets the client.
pub const ROOT: &str = "/";
/// The route for liveness checks.
pub const HEALTH: &str = "/healthz";
/// The route for getting a page of a single user's transactions.
pub const USER_TRANSACTIONS: &str = "/users/{user_id}/transactions/";
/// The route for counting all transactions in a date range.
pub const TRANSACTIONS: &str = "/transactions/";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace and ends with a
/// right brace. For example, in the endpoint path '/users/{user_id}',
/// '{user_id}' is the parameter. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: &str) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

/// The route without its trailing slash, e.g. '/transactions' for '/transactions/'.
pub fn without_trailing_slash(endpoint_path: &str) -> &str {
    match endpoint_path.strip_suffix('/') {
        Some("") | None => endpoint_path,
        Some(trimmed) => trimmed,
    }
}
