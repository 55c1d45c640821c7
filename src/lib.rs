//! Signalbox: task coordination engine for agent-driven development.
//!
//! This crate provides the core functionality for tracking development tasks
//! from external trigger to merged change request: a validated lifecycle
//! state machine, TTL-bounded resource leasing, and an event router that
//! drives worker agents and answers to human slash commands.
//!
//! # Architecture
//!
//! Signalbox follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (storage, workers, etc.)
//!
//! # Modules
//!
//! - [`task`]: Trigger-to-task creation and lifecycle tracking
//! - [`lock`]: Resource leasing with expiry and conflict detection
//! - [`router`]: Event dispatch, worker driving, and finalization
//! - [`config`]: Engine tuning knobs

pub mod config;
pub mod lock;
pub mod router;
pub mod task;
