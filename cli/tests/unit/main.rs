//! Unit tests for sprout CLI
//!
//! These tests use mocked ports and run fast without external I/O.

mod architecture;
mod mocks;
