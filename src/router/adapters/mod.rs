//! Adapter implementations of the router ports.

pub mod memory;

pub use memory::InMemoryArchiveSink;
