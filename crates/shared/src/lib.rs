// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Offertedesk Shared Types and Utilities
//!
//! This crate contains row types, ID wrappers, and database helpers shared by
//! the billing and API crates.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
