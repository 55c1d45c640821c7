//! Resource leasing for Signalbox.
//!
//! Guards file-scoped resources against concurrent modification: tasks lease
//! their predicted paths before any work starts, leases expire on a hard
//! TTL, and acquisition is all-or-nothing over the full requested set so
//! overlapping tasks serialize instead of interleaving. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
