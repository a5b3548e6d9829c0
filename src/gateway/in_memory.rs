//! A search backend that keeps its documents in memory.

use std::{cmp::Ordering, sync::Arc};

use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::transaction::{CREATION_DATE_FIELD, Clause, SearchPredicate, SortDirection};

use super::{BoundedSearch, GatewayError, Hit, SearchBackend, SearchResult};

/// Evaluates search predicates against a fixed set of JSON documents.
///
/// Matching follows the Elasticsearch semantics the service relies on: term
/// clauses compare the field's value exactly, exists clauses ignore `null`
/// fields and range clauses compare RFC 3339 timestamps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    documents: Arc<Vec<Hit>>,
}

impl InMemoryBackend {
    /// Create a backend holding `documents`.
    pub fn new(documents: impl IntoIterator<Item = Hit>) -> Self {
        Self {
            documents: Arc::new(documents.into_iter().collect()),
        }
    }

    /// Create a backend from a JSON array of objects.
    ///
    /// Each object's `_id` field is used as its document ID and the rest of
    /// the object as its source.
    ///
    /// # Errors
    /// Returns [GatewayError::Decode] if `value` is not an array of objects
    /// with string IDs.
    pub fn from_json(value: Value) -> Result<Self, GatewayError> {
        let Value::Array(items) = value else {
            return Err(GatewayError::Decode("expected an array of documents".to_owned()));
        };

        let documents = items
            .into_iter()
            .map(|item| {
                let Value::Object(mut fields) = item else {
                    return Err(GatewayError::Decode("expected a JSON object".to_owned()));
                };

                match fields.remove("_id") {
                    Some(Value::String(id)) => Ok(Hit::new(id, Value::Object(fields))),
                    _ => Err(GatewayError::Decode("document is missing `_id`".to_owned())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(documents))
    }

    fn matching(&self, predicate: &SearchPredicate) -> Vec<Hit> {
        self.documents
            .iter()
            .filter(|hit| matches(predicate, &hit.source))
            .cloned()
            .collect()
    }
}

/// Iteration state for [InMemoryBackend].
#[derive(Debug)]
pub struct InMemoryCursor {
    predicate: SearchPredicate,
    batch_size: usize,
    /// Filled on the first fetch so later batches see a consistent snapshot.
    snapshot: Option<Vec<Hit>>,
    position: usize,
}

impl SearchBackend for InMemoryBackend {
    type Cursor = InMemoryCursor;

    async fn search(&self, request: &BoundedSearch) -> Result<SearchResult, GatewayError> {
        let mut hits = self.matching(&request.predicate);
        let total = hits.len() as i64;

        hits.sort_by(|a, b| compare_creation_dates(a, b, request.sort));

        let offset = usize::try_from(request.window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.window.limit).unwrap_or(usize::MAX);
        let hits = hits.into_iter().skip(offset).take(limit).collect();

        Ok(SearchResult { hits, total })
    }

    fn open_cursor(&self, predicate: &SearchPredicate, batch_size: u64) -> Self::Cursor {
        InMemoryCursor {
            predicate: predicate.clone(),
            batch_size: usize::try_from(batch_size).unwrap_or(usize::MAX).max(1),
            snapshot: None,
            position: 0,
        }
    }

    async fn next_batch(
        &self,
        cursor: &mut Self::Cursor,
    ) -> Result<Option<SearchResult>, GatewayError> {
        let snapshot = cursor
            .snapshot
            .get_or_insert_with(|| self.matching(&cursor.predicate));

        if cursor.position >= snapshot.len() {
            return Ok(None);
        }

        let end = cursor.position.saturating_add(cursor.batch_size).min(snapshot.len());
        let hits = snapshot[cursor.position..end].to_vec();
        cursor.position = end;

        Ok(Some(SearchResult {
            hits,
            total: snapshot.len() as i64,
        }))
    }

    async fn release_cursor(&self, _cursor: Self::Cursor) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Whether the document `source` satisfies every clause of `predicate`.
fn matches(predicate: &SearchPredicate, source: &Value) -> bool {
    predicate.clauses().iter().all(|clause| match clause {
        Clause::Term { field, value } => match source.get(field) {
            Some(Value::String(text)) => text == value,
            Some(Value::Number(number)) => number.to_string() == *value,
            Some(Value::Bool(flag)) => flag.to_string() == *value,
            _ => false,
        },
        Clause::AnyExists { fields } => fields
            .iter()
            .any(|field| source.get(field).is_some_and(|value| !value.is_null())),
        Clause::Range { field, range } => {
            timestamp(source, field).is_some_and(|timestamp| range.contains(timestamp))
        }
    })
}

fn timestamp(source: &Value, field: &str) -> Option<OffsetDateTime> {
    source
        .get(field)
        .and_then(Value::as_str)
        .and_then(|text| OffsetDateTime::parse(text, &Rfc3339).ok())
}

/// Documents without a creation date sort last in either direction.
fn compare_creation_dates(a: &Hit, b: &Hit, sort: SortDirection) -> Ordering {
    let a = timestamp(&a.source, CREATION_DATE_FIELD);
    let b = timestamp(&b.source, CREATION_DATE_FIELD);

    match (a, b, sort) {
        (Some(a), Some(b), SortDirection::Ascending) => a.cmp(&b),
        (Some(a), Some(b), SortDirection::Descending) => b.cmp(&a),
        (Some(_), None, _) => Ordering::Less,
        (None, Some(_), _) => Ordering::Greater,
        (None, None, _) => Ordering::Equal,
    }
}
