//! # docmap Testkit
//!
//! Test utilities for docmap.
//!
//! This crate provides:
//! - The fixture model and an in-memory unit of work
//! - Property-based test generators using proptest
//! - Store drivers that record or fail every call
//! - A cross-crate integration harness
//!
//! ## Usage
//!
//! ```rust
//! use docmap_testkit::prelude::*;
//!
//! let harness = IntegrationHarness::new();
//! let user = harness.uow.create("User");
//! harness.uow.set(user, "username", "alice");
//! harness.insert_all(&[user]);
//! assert_eq!(harness.records("User").len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use recording::*;
