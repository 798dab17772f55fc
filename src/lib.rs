//! # EdgeCrawl
//!
//! Incremental crawler for local file systems and network shares. Folders
//! are pulled from a work queue, compared against the last known state in
//! the tree store, and every new, changed or removed file becomes a change
//! event for the downstream indexing pipeline.
//!
//! ## Core Components
//!
//! - [`rules`]: include/exclude predicates for files and folders
//! - [`store`]: the persistent Branch/Leaf tree of last known state
//! - [`crawler`]: the Differencer and the worker pool running crawl tasks
//! - [`recovery`]: rebuild of the work queue from the authoritative index
//! - [`scheduler`]: root seeding on refresh cycles and periodic tree flushes
//! - [`queue`]: the SQLite work queue and event outbox
//! - [`fs`]: local and share file access behind one interface
//! - [`routes`]: the admin HTTP API

pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod fs;
pub mod metrics;
pub mod path;
pub mod queue;
pub mod recovery;
pub mod routes;
pub mod rules;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
