//! Fail-fast checks applied while a scenario is being configured.
//!
//! Each check takes the error to raise and returns it when the predicate
//! fails. The offending value is logged at debug level first so that a
//! failing configuration can be diagnosed from the test output.

use crate::{Error, Result};
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

/// Fails with `err` unless `value` is present.
pub fn should_be_defined<T: Debug>(value: Option<&T>, err: Error) -> Result<()> {
    match value {
        Some(_) => Ok(()),
        None => {
            debug!(error = %err, "Precondition failed: value is undefined");
            Err(err)
        }
    }
}

/// Fails with `err` unless `value` is a non-empty string.
pub fn should_be_string(value: &str, err: Error) -> Result<()> {
    if value.trim().is_empty() {
        debug!(value = %value, error = %err, "Precondition failed: expected a non-empty string");
        return Err(err);
    }
    Ok(())
}

/// Fails with `err` unless `value` is a JSON array.
pub fn should_be_array(value: &Value, err: Error) -> Result<()> {
    if value.is_array() {
        Ok(())
    } else {
        debug!(value = %value, error = %err, "Precondition failed: expected an array");
        Err(err)
    }
}

/// Fails with `err` unless `condition` holds.
pub fn check_argument(condition: bool, err: Error) -> Result<()> {
    if condition {
        Ok(())
    } else {
        debug!(error = %err, "Precondition failed: argument check");
        Err(err)
    }
}
