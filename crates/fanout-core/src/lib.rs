//! fanout core
//!
//! Core domain types, traits, and error handling for fanout.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the scheduler, runner, publisher and CLI crates.

pub mod artifact;
pub mod config;
pub mod error;
pub mod ids;
pub mod matrix;
pub mod ports;
pub mod run;
pub mod secrets;
pub mod trigger;

pub use error::{Error, Result};
pub use ids::*;
