//! Delivery styles for values returned by mocked functions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a configured value is handed back to the caller of a mocked function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// The stub returns the value directly.
    #[default]
    Synchronous,
    /// The stub invokes the trailing callback argument with the value.
    Asynchronous,
    /// The stub returns a future that settles with the value on a later poll.
    Deferred,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnKind::Synchronous => "synchronous",
            ReturnKind::Asynchronous => "asynchronous",
            ReturnKind::Deferred => "deferred",
        };
        f.write_str(name)
    }
}
