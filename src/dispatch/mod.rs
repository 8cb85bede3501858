//! Fan-out dispatch
//!
//! One dispatch request becomes one queued task per (pipeline, account)
//! pair. Accounts are discovered afresh each time.

mod dispatcher;

pub use dispatcher::{DispatchReport, Dispatcher, FailedTask};

#[cfg(test)]
mod tests;
