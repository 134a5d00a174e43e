//! # Elastic Sync Repository
//!
//! This crate provides the boundary to the search engine: the abstract
//! [`SearchTransport`] trait the pipeline depends on, the transport error
//! taxonomy with its transient/permanent classification, and a concrete
//! implementation backed by Elasticsearch's bulk and document APIs.

pub mod elasticsearch;
pub mod errors;
pub mod interfaces;
pub mod types;

pub use self::elasticsearch::{ElasticsearchTransport, IndexConfig};
pub use errors::TransportError;
pub use interfaces::SearchTransport;
pub use types::{BulkItemResult, BulkReport};
