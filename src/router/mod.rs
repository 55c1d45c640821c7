//! Event routing for Signalbox.
//!
//! Consumes every event the engine reacts to: external triggers, human slash
//! commands, worker completions, timeout probes, and change-request
//! resolutions. The router decides what each event means for the tracked
//! task, gates work-starting transitions behind resource leases, drives
//! worker invocations until the task settles, and finalizes terminal tasks
//! into the archive. The module follows hexagonal architecture:
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
