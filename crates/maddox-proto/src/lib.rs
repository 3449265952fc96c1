//! # maddox-proto
//!
//! Shared types, error definitions, and preconditions for the Maddox test-double engine.
//!
//! This crate provides the vocabulary used across all Maddox crates,
//! including:
//! - Mock and function identifiers
//! - Return delivery kinds for mocked functions
//! - The common error type
//! - Precondition checks used while a scenario is being configured

mod error;
mod ids;
pub mod preconditions;
mod return_kind;

pub use error::{Error, Result};
pub use ids::{FunctionName, MockId};
pub use return_kind::ReturnKind;
