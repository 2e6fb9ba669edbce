#![deny(missing_docs)]

//! Core library for the docsum document summarization pipeline.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Language-model client abstraction and adapters.
pub mod model;
/// Document processing pipeline.
pub mod processing;
/// File lifecycle store.
pub mod store;
