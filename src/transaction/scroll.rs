//! Cursor-based iteration over every transaction matching a predicate.

use crate::gateway::{GatewayError, SearchBackend, SearchResult};

use super::predicate::SearchPredicate;

/// A single pass over the documents matching a predicate.
///
/// Batches are fetched one after another since each fetch depends on the
/// cursor state left by the previous one. Once the backend signals the end of
/// the results, or a fetch fails, the cursor is released and every further
/// call to [Scroll::next_batch] returns `Ok(None)`. A scroll cannot be
/// restarted, open a new one instead.
pub struct Scroll<'a, B: SearchBackend> {
    backend: &'a B,
    cursor: Option<B::Cursor>,
}

impl<'a, B: SearchBackend> Scroll<'a, B> {
    /// Open a scroll over the documents matching `predicate`, `batch_size` at a time.
    pub fn open(backend: &'a B, predicate: &SearchPredicate, batch_size: u64) -> Self {
        Self {
            backend,
            cursor: Some(backend.open_cursor(predicate, batch_size)),
        }
    }

    /// Fetch the next batch, or `None` once every document has been seen.
    ///
    /// # Errors
    /// Returns the backend's error if a fetch fails. The scroll is finished
    /// afterwards and cannot be resumed.
    pub async fn next_batch(&mut self) -> Result<Option<SearchResult>, GatewayError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let result = self.backend.next_batch(cursor).await;
        if !matches!(result, Ok(Some(_))) {
            self.release().await;
        }

        result
    }

    async fn release(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            if let Err(error) = self.backend.release_cursor(cursor).await {
                tracing::warn!("could not release scroll cursor: {error}");
            }
        }
    }
}

/// The outcome of scrolling through a full result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollSummary {
    /// The number of matching documents reported by the backend.
    pub total: i64,
    /// The number of non-empty batches fetched.
    pub batches: usize,
}

/// Scroll through every document matching `predicate` and report how many matched.
///
/// The fetched documents themselves are discarded.
///
/// # Errors
/// Returns the first error reported by the backend, without resuming.
pub async fn count_all<B: SearchBackend>(
    backend: &B,
    predicate: &SearchPredicate,
    batch_size: u64,
) -> Result<ScrollSummary, GatewayError> {
    let mut scroll = Scroll::open(backend, predicate, batch_size);
    let mut summary = ScrollSummary::default();

    while let Some(batch) = scroll.next_batch().await? {
        // Every batch reports the overall total, not the size of the batch.
        summary.total = batch.total;
        summary.batches += 1;
    }

    Ok(summary)
}
