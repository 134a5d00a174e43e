//! Error types for the search engine transport.

mod transport_error;

pub use transport_error::TransportError;
