//! # Elastic Sync Shared
//!
//! Shared types and data structures for the elastic-sync system:
//! the write [`Operation`] unit, the [`Entity`] property bag, the
//! immutable [`IndexConfiguration`] and the [`Mapping`] collaborator
//! that translates entities into search documents.

pub mod config;
pub mod mapping;
pub mod operation;

pub use config::{AuthCredentials, IndexConfiguration};
pub use mapping::{DefaultMapping, Mapping, MappingError};
pub use operation::{DocumentBody, Entity, Operation};
