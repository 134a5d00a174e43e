//! Elasticsearch implementation of the search transport.
//!
//! This module provides a concrete implementation of `SearchTransport`
//! using Elasticsearch's bulk and document APIs.

mod client;
mod index_config;

pub use client::ElasticsearchTransport;
pub use index_config::IndexConfig;
