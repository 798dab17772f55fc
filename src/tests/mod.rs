//! Unit and integration tests for the crawler.
//!
//! - **config_tests**: configuration defaults and validation
//! - **error_tests**: error display and HTTP mapping
//! - **rules_tests**: include/exclude predicates
//! - **store_tests**: tree store mutations and persistence
//! - **diff_tests**: the Differencer
//! - **fs_tests**: local file access and scheme routing
//! - **crawler_tests**: the per-task state machine and the worker engine
//! - **queue_tests**: the SQLite work queue and event outbox
//! - **recovery_tests**: work queue rebuild from an index export
//! - **scheduler_tests**: root seeding and flushing
//! - **health_api_tests**: admin HTTP endpoints

pub mod diff_tests;
pub mod fs_tests;
pub mod health_api_tests;
pub mod queue_tests;
pub mod store_tests;
