//! A search backend that queries an Elasticsearch index over HTTP.

use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

use crate::transaction::{CREATION_DATE_FIELD, Clause, SearchPredicate};

use super::{BoundedSearch, GatewayError, Hit, SearchBackend, SearchResult};

/// How long to wait for Elasticsearch to answer a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
/// How many times to send an idempotent request before giving up.
const MAX_ATTEMPTS: u32 = 3;
/// How long Elasticsearch keeps a scroll context alive between batches.
const SCROLL_KEEP_ALIVE: &str = "1m";

/// Queries transaction documents stored in an Elasticsearch index.
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    client: Client,
    base_url: String,
    index: String,
    debug: bool,
}

impl ElasticBackend {
    /// Create a client for `index` on the cluster at `base_url`.
    ///
    /// When `debug` is set every request and response is logged at the
    /// `debug` level and failed requests are not retried.
    ///
    /// # Errors
    /// Returns [GatewayError::Unreachable] if the HTTP client cannot be built.
    pub fn new(base_url: &str, index: &str, debug: bool) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GatewayError::from)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            index: index.to_owned(),
            debug,
        })
    }

    /// Check that the cluster is reachable and return its version number.
    pub async fn ping(&self) -> Result<String, GatewayError> {
        let info = self.send(Method::GET, &self.base_url, None, true).await?;

        info.pointer("/version/number")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Decode("missing version number".to_owned()))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        idempotent: bool,
    ) -> Result<Value, GatewayError> {
        let attempts = if idempotent && !self.debug {
            MAX_ATTEMPTS
        } else {
            1
        };
        let mut attempt = 1;

        loop {
            match self.send_once(method.clone(), url, body).await {
                Err(error) if error.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "Elasticsearch request {method} {url} failed, retrying: {error}"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        if self.debug {
            tracing::debug!(%method, url, body = ?body, "Elasticsearch request");
        }

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if self.debug {
            tracing::debug!(
                status = status.as_u16(),
                elapsed = ?start.elapsed(),
                "Elasticsearch response"
            );
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Iteration state for [ElasticBackend], wrapping a scroll context.
#[derive(Debug)]
pub struct ElasticCursor {
    predicate: SearchPredicate,
    batch_size: u64,
    scroll_id: Option<String>,
    exhausted: bool,
}

impl SearchBackend for ElasticBackend {
    type Cursor = ElasticCursor;

    async fn search(&self, request: &BoundedSearch) -> Result<SearchResult, GatewayError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let body = search_body(request)?;

        let response = self.send(Method::POST, &url, Some(&body), true).await?;

        parse_search_response(response).map(|(_, result)| result)
    }

    fn open_cursor(&self, predicate: &SearchPredicate, batch_size: u64) -> Self::Cursor {
        ElasticCursor {
            predicate: predicate.clone(),
            batch_size,
            scroll_id: None,
            exhausted: false,
        }
    }

    async fn next_batch(
        &self,
        cursor: &mut Self::Cursor,
    ) -> Result<Option<SearchResult>, GatewayError> {
        if cursor.exhausted {
            return Ok(None);
        }

        // Advancing a scroll is not idempotent, so these requests are never retried.
        let response = match &cursor.scroll_id {
            None => {
                let url = format!(
                    "{}/{}/_search?scroll={SCROLL_KEEP_ALIVE}",
                    self.base_url, self.index
                );
                let body = scroll_body(&cursor.predicate, cursor.batch_size)?;
                self.send(Method::POST, &url, Some(&body), false).await?
            }
            Some(scroll_id) => {
                let url = format!("{}/_search/scroll", self.base_url);
                let body = json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": scroll_id });
                self.send(Method::POST, &url, Some(&body), false).await?
            }
        };

        let (scroll_id, result) = parse_search_response(response)?;
        if scroll_id.is_some() {
            cursor.scroll_id = scroll_id;
        }

        if result.hits.is_empty() {
            cursor.exhausted = true;
            return Ok(None);
        }

        Ok(Some(result))
    }

    async fn release_cursor(&self, cursor: Self::Cursor) -> Result<(), GatewayError> {
        let Some(scroll_id) = cursor.scroll_id else {
            return Ok(());
        };

        let url = format!("{}/_search/scroll", self.base_url);
        let body = json!({ "scroll_id": [scroll_id] });

        match self.send(Method::DELETE, &url, Some(&body), false).await {
            // The scroll context already expired.
            Err(GatewayError::Status { status: 404, .. }) => Ok(()),
            result => result.map(|_| ()),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout
        } else if error.is_connect() {
            GatewayError::Unreachable(error.to_string())
        } else if error.is_decode() {
            GatewayError::Decode(error.to_string())
        } else {
            GatewayError::Request(error.to_string())
        }
    }
}

/// The body of a bounded search request.
fn search_body(request: &BoundedSearch) -> Result<Value, GatewayError> {
    Ok(json!({
        "query": query_dsl(&request.predicate)?,
        "from": request.window.offset,
        "size": request.window.limit,
        "sort": [{ CREATION_DATE_FIELD: { "order": request.sort.as_str() } }],
        "track_total_hits": true,
    }))
}

/// The body of the request that opens a scroll context.
fn scroll_body(predicate: &SearchPredicate, batch_size: u64) -> Result<Value, GatewayError> {
    Ok(json!({
        "query": query_dsl(predicate)?,
        "size": batch_size,
        "sort": ["_doc"],
        "track_total_hits": true,
    }))
}

/// Translate `predicate` into the Elasticsearch query DSL.
///
/// # Errors
/// Returns [GatewayError::InvalidQuery] if a date bound cannot be written as
/// an RFC 3339 timestamp. The clause is never dropped.
fn query_dsl(predicate: &SearchPredicate) -> Result<Value, GatewayError> {
    let must = predicate
        .clauses()
        .iter()
        .map(clause_dsl)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "bool": { "must": must } }))
}

fn clause_dsl(clause: &Clause) -> Result<Value, GatewayError> {
    let dsl = match clause {
        Clause::Term { field, value } => json!({ "term": { *field: value } }),
        Clause::AnyExists { fields } => {
            let should: Vec<Value> = fields
                .iter()
                .map(|field| json!({ "exists": { "field": field } }))
                .collect();

            json!({ "bool": { "should": should, "minimum_should_match": 1 } })
        }
        Clause::Range { field, range } => {
            let mut bounds = Map::new();
            if let Some(from) = range.from {
                bounds.insert("gte".to_owned(), Value::String(format_timestamp(from)?));
            }
            if let Some(to) = range.to {
                bounds.insert("lt".to_owned(), Value::String(format_timestamp(to)?));
            }

            json!({ "range": { *field: bounds } })
        }
    };

    Ok(dsl)
}

/// Format `timestamp` in UTC, which RFC 3339 can always express unless the
/// year falls outside 0 to 9999.
fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, GatewayError> {
    let utc = timestamp.checked_to_offset(UtcOffset::UTC).ok_or_else(|| {
        GatewayError::InvalidQuery(format!("timestamp {timestamp} is out of range in UTC"))
    })?;

    utc.format(&Rfc3339).map_err(|error| {
        GatewayError::InvalidQuery(format!("could not format timestamp {timestamp}: {error}"))
    })
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// Elasticsearch 7+ reports `{"value": n, "relation": "eq"}`, older versions a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(i64),
    Object { value: i64 },
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

fn parse_search_response(response: Value) -> Result<(Option<String>, SearchResult), GatewayError> {
    let response: SearchResponse = serde_json::from_value(response)
        .map_err(|error| GatewayError::Decode(error.to_string()))?;

    let total = match response.hits.total {
        TotalHits::Count(total) | TotalHits::Object { value: total } => total,
    };
    let hits = response
        .hits
        .hits
        .into_iter()
        .map(|hit| Hit::new(hit.id, hit.source))
        .collect();

    Ok((response.scroll_id, SearchResult { hits, total }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;
    use time::macros::datetime;

    use crate::{
        gateway::{BoundedSearch, GatewayError, Hit, SearchBackend},
        pagination::PageWindow,
        transaction::{QueryIntent, SortDirection, build_predicate},
    };

    use super::{ElasticBackend, parse_search_response, query_dsl, search_body};

    #[test]
    fn empty_predicate_matches_everything() {
        let got = query_dsl(&build_predicate(&QueryIntent::default())).unwrap();

        assert_eq!(got, json!({ "bool": { "must": [] } }));
    }

    #[test]
    fn translates_every_clause() {
        let intent = QueryIntent {
            user_id: Some("42".to_owned()),
            types: BTreeSet::from(["fee".to_owned(), "credit".to_owned()]),
            date_from: Some(datetime!(2020-01-01 00:00 UTC)),
            date_to: Some(datetime!(2020-02-01 00:00 UTC)),
            ..Default::default()
        };

        let got = query_dsl(&build_predicate(&intent)).unwrap();

        assert_eq!(
            got,
            json!({
                "bool": {
                    "must": [
                        { "term": { "user_id": "42" } },
                        {
                            "bool": {
                                "should": [
                                    { "exists": { "field": "credit" } },
                                    { "exists": { "field": "fee" } },
                                ],
                                "minimum_should_match": 1,
                            }
                        },
                        {
                            "range": {
                                "creation_date": {
                                    "gte": "2020-01-01T00:00:00Z",
                                    "lt": "2020-02-01T00:00:00Z",
                                }
                            }
                        },
                    ]
                }
            })
        );
    }

    #[test]
    fn half_open_range_has_single_bound() {
        let intent = QueryIntent {
            date_to: Some(datetime!(2020-02-01 00:00 UTC)),
            ..Default::default()
        };

        let got = query_dsl(&build_predicate(&intent)).unwrap();

        assert_eq!(
            got["bool"]["must"][0],
            json!({ "range": { "creation_date": { "lt": "2020-02-01T00:00:00Z" } } })
        );
    }

    #[test]
    fn range_bounds_are_converted_to_utc() {
        let intent = QueryIntent {
            date_from: Some(datetime!(2020-01-01 09:30 +09:30)),
            date_to: Some(datetime!(2020-02-01 00:00:00 +01:00:30)),
            ..Default::default()
        };

        let got = query_dsl(&build_predicate(&intent)).unwrap();

        assert_eq!(
            got["bool"]["must"][0],
            json!({
                "range": {
                    "creation_date": {
                        "gte": "2020-01-01T00:00:00Z",
                        "lt": "2020-01-31T22:59:30Z",
                    }
                }
            })
        );
    }

    #[test]
    fn unformattable_bound_fails_instead_of_widening_query() {
        let intent = QueryIntent {
            date_to: Some(datetime!(9999-12-31 23:00 -05:00)),
            ..Default::default()
        };

        let got = query_dsl(&build_predicate(&intent));

        assert!(matches!(got, Err(GatewayError::InvalidQuery(_))), "got {got:?}");
    }

    #[tokio::test]
    async fn unformattable_bound_fails_scroll_without_request() {
        // Nothing listens on this port, so reaching the network would be Unreachable.
        let backend = ElasticBackend::new("http://127.0.0.1:1", "transactions", true).unwrap();
        let intent = QueryIntent {
            date_from: Some(datetime!(9999-12-31 23:00 -05:00)),
            ..Default::default()
        };
        let mut cursor = backend.open_cursor(&build_predicate(&intent), 10);

        let got = backend.next_batch(&mut cursor).await;

        assert!(matches!(got, Err(GatewayError::InvalidQuery(_))), "got {got:?}");
    }

    #[test]
    fn search_body_has_window_and_sort() {
        let request = BoundedSearch {
            predicate: build_predicate(&QueryIntent::default()),
            sort: SortDirection::Ascending,
            window: PageWindow {
                offset: 40,
                limit: 20,
            },
        };

        let got = search_body(&request).unwrap();

        assert_eq!(got["from"], 40);
        assert_eq!(got["size"], 20);
        assert_eq!(got["sort"], json!([{ "creation_date": { "order": "asc" } }]));
    }

    #[test]
    fn parses_modern_total_hits() {
        let response = json!({
            "_scroll_id": "abc",
            "hits": {
                "total": { "value": 12, "relation": "eq" },
                "hits": [{ "_id": "1", "_source": { "user_id": "42" } }]
            }
        });

        let (scroll_id, got) = parse_search_response(response).unwrap();

        assert_eq!(scroll_id.as_deref(), Some("abc"));
        assert_eq!(got.total, 12);
        assert_eq!(got.hits, [Hit::new("1", json!({ "user_id": "42" }))]);
    }

    #[test]
    fn parses_legacy_total_hits() {
        let response = json!({ "hits": { "total": 3, "hits": [] } });

        let (scroll_id, got) = parse_search_response(response).unwrap();

        assert_eq!(scroll_id, None);
        assert_eq!(got.total, 3);
        assert!(got.hits.is_empty());
    }

    #[test]
    fn malformed_response_is_decode_error() {
        let got = parse_search_response(json!({ "took": 3 }));

        assert!(matches!(got, Err(GatewayError::Decode(_))));
    }

    #[tokio::test]
    async fn exhausted_cursor_makes_no_requests() {
        // Nothing listens on this port, any request would fail.
        let backend = ElasticBackend::new("http://127.0.0.1:1/", "transactions", false).unwrap();
        let mut cursor = backend.open_cursor(&build_predicate(&QueryIntent::default()), 10);
        cursor.exhausted = true;

        assert_eq!(backend.next_batch(&mut cursor).await, Ok(None));
        assert_eq!(backend.release_cursor(cursor).await, Ok(()));
    }

    #[test]
    fn malformed_request_is_not_unreachable() {
        let error = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();

        let got = GatewayError::from(error);

        assert!(matches!(got, GatewayError::Request(_)), "got {got:?}");
        assert!(!got.is_transient());
    }

    #[tokio::test]
    async fn unreachable_cluster_is_reported() {
        let backend = ElasticBackend::new("http://127.0.0.1:1", "transactions", true).unwrap();

        let got = backend.ping().await;

        assert!(
            matches!(got, Err(GatewayError::Unreachable(_) | GatewayError::Timeout)),
            "got {got:?}"
        );
    }
}
