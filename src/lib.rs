//! Workspace change monitoring.
//!
//! Watches a project tree, drops paths that must not affect downstream
//! processing, and tells an index/instruction consumer what changed.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
