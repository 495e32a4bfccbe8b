//! Common test utilities for API integration tests
//!
//! This module provides shared test infrastructure for integration tests,
//! including seeded stores, executors, and HTTP helpers.

#![allow(unused_imports)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
