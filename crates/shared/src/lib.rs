//! Shared infrastructure for the filing reconciliation binaries
//!
//! Database pool construction and tracing initialisation used by both the
//! API server and the background worker.

pub mod db;
pub mod telemetry;

pub use db::create_pool;
pub use telemetry::init_tracing;
