//! # Harvester Testing Utils
//!
//! Shared testing utilities for the harvest engine.
//! This crate provides scripted brokers, in-memory stores, a recording
//! trigger context and builders for test data.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! harvester-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
