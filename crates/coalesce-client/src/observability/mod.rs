//! Observability setup for coalesce clients.
//!
//! The engine itself only emits `tracing` events and `metrics` counters;
//! this module installs the subscriber that renders them.

mod logging;

pub use logging::{init_logging, subscriber_with_writer, DIAGNOSTICS_TARGET};
