//! CLI module
//!
//! Command-line interface and HTTP trigger.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP trigger
//! - `dispatch` - Fan out tasks for every pipeline and account
//! - `run` - Run one pipeline for one account
//! - `pipelines` - List built-in pipelines
//! - `auth-url` - Print the OAuth dialog URL

mod app;
mod commands;
mod runner;
mod server;

pub use app::App;
pub use commands::{Cli, Commands};
pub use runner::Runner;
pub use server::{router, serve};
