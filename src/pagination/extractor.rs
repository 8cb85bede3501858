//! Record stream over a completed report

use super::types::PaginationState;
use crate::error::Result;
use crate::provider::InsightsApi;
use crate::types::{JobId, Record};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Turns a completed report into a lazy stream of rows
///
/// At most one page is held at a time: the next page is requested only after
/// the consumer has taken every row of the current one. A failed fetch ends
/// the stream with that error.
pub struct Extractor {
    api: Arc<dyn InsightsApi>,
}

struct ExtractState {
    api: Arc<dyn InsightsApi>,
    job: JobId,
    buffer: VecDeque<Record>,
    pagination: PaginationState,
}

impl Extractor {
    pub fn new(api: Arc<dyn InsightsApi>) -> Self {
        Self { api }
    }

    /// Stream every row of `job`, in provider order, starting from the first page
    pub fn extract(&self, job: JobId) -> BoxStream<'static, Result<Record>> {
        let state = ExtractState {
            api: Arc::clone(&self.api),
            job,
            buffer: VecDeque::new(),
            pagination: PaginationState::new(),
        };

        stream::try_unfold(state, next_record).boxed()
    }
}

/// Pop the next buffered row, fetching a page only when the buffer is empty
async fn next_record(mut state: ExtractState) -> Result<Option<(Record, ExtractState)>> {
    loop {
        if let Some(record) = state.buffer.pop_front() {
            return Ok(Some((record, state)));
        }
        if state.pagination.done {
            debug!(
                job_id = %state.job,
                pages = state.pagination.pages,
                records = state.pagination.total_fetched,
                "Report exhausted"
            );
            return Ok(None);
        }

        let page = state
            .api
            .fetch_page(&state.job, state.pagination.cursor.as_ref())
            .await?;
        debug!(
            job_id = %state.job,
            page = state.pagination.pages + 1,
            records = page.records.len(),
            last = page.is_last(),
            "Fetched page"
        );
        state.pagination.advance(page.records.len(), page.next_cursor);
        state.buffer.extend(page.records);
    }
}
