//! Task lifecycle management for Signalbox.
//!
//! Tracks one task per external trigger through a fixed state machine:
//! creation from qualifying triggers, validated transitions with an
//! append-only decision log, version-conditioned persistence, observer
//! fan-out of transition events, and archival of finalized tasks. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
