//! Unit tests for the router module.
