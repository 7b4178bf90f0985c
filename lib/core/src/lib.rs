//! Core types shared by the warden identity crates.
//!
//! This crate provides the `Result` alias used for layered error reporting
//! and the identifier types that cross crate boundaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RequestId};
