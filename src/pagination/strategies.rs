//! Cursor pagination for Graph API edges

use super::types::{lookup, Page};
use crate::error::{Error, Result};
use crate::http::RequestConfig;
use crate::types::{Cursor, Record};
use serde_json::Value;

/// Cursor-based pagination over `{data, paging: {cursors: {after}, next}}`
///
/// The cursor is read from the response and handed back verbatim. The result
/// set ends when the response carries no `next` link.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter carrying the cursor
    pub cursor_param: String,
    /// Path of the cursor in the response
    pub cursor_path: String,
    /// Path whose presence means another page exists
    pub next_path: String,
    /// Path of the rows array
    pub records_path: String,
}

impl CursorPaginator {
    pub fn new(
        cursor_param: impl Into<String>,
        cursor_path: impl Into<String>,
        next_path: impl Into<String>,
        records_path: impl Into<String>,
    ) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            next_path: next_path.into(),
            records_path: records_path.into(),
        }
    }

    /// The Graph API convention
    pub fn graph() -> Self {
        Self::new("after", "paging.cursors.after", "paging.next", "data")
    }

    /// Request parameters for the page at `cursor`
    pub fn request(&self, cursor: Option<&Cursor>) -> RequestConfig {
        RequestConfig::new().query_opt(&self.cursor_param, cursor.map(Cursor::as_str))
    }

    /// Cursor of the following page, if there is one
    ///
    /// A `next` link without a usable cursor is a decode error, not the end
    /// of the result set.
    pub fn next_cursor(&self, body: &Value) -> Result<Option<Cursor>> {
        let has_next = match lookup(body, &self.next_path) {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !has_next {
            return Ok(None);
        }

        lookup(body, &self.cursor_path)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| Some(Cursor::new(s)))
            .ok_or_else(|| {
                Error::decode(format!(
                    "'{}' is set but '{}' is missing",
                    self.next_path, self.cursor_path
                ))
            })
    }

    /// Split a response into its rows and continuation
    pub fn page(&self, body: Value) -> Result<Page> {
        let next_cursor = self.next_cursor(&body)?;

        let rows = match lookup(&body, &self.records_path) {
            Some(Value::Array(rows)) => rows,
            Some(other) => {
                return Err(Error::decode(format!(
                    "'{}' is not an array: {other}",
                    self.records_path
                )))
            }
            None => {
                return Err(Error::decode(format!(
                    "response has no '{}' array",
                    self.records_path
                )))
            }
        };

        let records = rows
            .iter()
            .map(|row| match row {
                Value::Object(map) => Ok(Record::clone(map)),
                other => Err(Error::decode(format!("row is not an object: {other}"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(records, next_cursor))
    }
}
