//! Configuration loading and dependency wiring.

pub mod dependencies;

pub use dependencies::Dependencies;
