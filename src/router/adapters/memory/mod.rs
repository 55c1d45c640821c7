//! In-memory adapters for event routing.

mod archive;

pub use archive::InMemoryArchiveSink;
