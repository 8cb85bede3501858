//! Pagination module
//!
//! # Overview
//!
//! Report results and account listings come back in cursor-linked pages.
//! [`CursorPaginator`] reads rows and the continuation out of each response;
//! [`Extractor`] chains the pages of a report into a pull-driven stream of
//! rows.

mod extractor;
mod strategies;
mod types;

pub use extractor::Extractor;
pub use strategies::CursorPaginator;
pub use types::{lookup, Page, PaginationState};
