#![deny(missing_docs)]

//! Core library for retrieval-augmented question answering over staged PDF documents.

/// Answer generation over a hosted chat model.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Document staging, promotion, reset, and querying.
pub mod pipeline;
/// Full-text search integration.
pub mod search;
/// Blob storage integration.
pub mod storage;
