//! Pagination types
//!
//! Defines the page abstraction shared by the provider client and the
//! extractor.

use crate::types::{Cursor, Record};
use serde_json::Value;

/// One page of a paginated result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Rows in provider order
    pub records: Vec<Record>,
    /// Token for the following page; `None` ends the result set
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(records: Vec<Record>, next_cursor: Option<Cursor>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Tracks progress through one result set
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Cursor for the next fetch; `None` before the first page
    pub cursor: Option<Cursor>,
    /// Pages fetched so far
    pub pages: u32,
    /// Records fetched so far
    pub total_fetched: u64,
    /// No more pages
    pub done: bool,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance past a fetched page
    pub fn advance(&mut self, page_len: usize, next_cursor: Option<Cursor>) {
        self.pages += 1;
        self.total_fetched += page_len as u64;
        self.done = next_cursor.is_none();
        self.cursor = next_cursor;
    }
}

/// Look up a dotted path such as `paging.cursors.after`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        _ => None,
    })
}
