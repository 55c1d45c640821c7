//! Unit tests for the lock module.
//!
//! Tests are organised by concern: lease expiry semantics, all-or-nothing
//! table behaviour, and coordinator canonicalization over the in-memory
//! table.
