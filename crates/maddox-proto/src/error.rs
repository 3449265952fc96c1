//! Error types for Maddox.
//!
//! Configuration errors are raised while a scenario is being built or
//! validated, before the entry point runs. Verification errors are raised
//! after execution and carry the mismatched values rendered as JSON.

use std::time::Duration;

/// Errors raised while configuring, running, or verifying a scenario.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No entry point function was bound to the scenario.
    #[error("Missing entry point: call `with_entry_point` before running the scenario")]
    MissingEntryPoint,

    /// No input params were provided to a generic scenario.
    #[error("Missing input params: call `with_input_params` before running the scenario")]
    MissingInputParams,

    /// No HTTP request was provided to an HTTP request scenario.
    #[error("Missing HTTP request: call `with_http_request` before running the scenario")]
    HttpReqUndefined,

    /// The HTTP request was not a sequence of handler arguments.
    #[error("HTTP request must be an array of handler arguments, got: {got}")]
    HttpRequestArray { got: String },

    /// A function name was empty.
    #[error("Function name for {context} must be a non-empty string")]
    EmptyFunctionName { context: &'static str },

    /// A mock identifier was empty.
    #[error("Mock name must be a non-empty string")]
    EmptyMockName,

    /// A generic scenario has no finisher designated.
    #[error("No finisher designated: mark exactly one mocked function with `set_finisher`")]
    MissingFinisher,

    /// An HTTP request scenario needs exactly one response-ending call.
    #[error("Exactly one response finisher is required; known finishers: {known}")]
    ExactlyOneResponseFinisher { known: String },

    /// A second finisher was designated in the same registry.
    #[error("Finisher already set to {existing}; cannot also mark {mock}.{func}")]
    MultipleFinishers {
        existing: String,
        mock: String,
        func: String,
    },

    /// A function registered as at-most-once was registered through another path.
    #[error("Function {mock}.{func} is already mocked and cannot be mocked again")]
    DuplicateMock { mock: String, func: String },

    /// A stub was invoked for a function that was never mocked.
    #[error("Function {mock}.{func} is not mocked")]
    NotMocked { mock: String, func: String },

    /// A stub outlived the scenario that owns its registry.
    #[error("Mock {mock} was invoked after its scenario was dropped")]
    MockDetached { mock: String },

    /// An asynchronous return was configured but the call had no callback argument.
    #[error("Function {mock}.{func} returns through a callback but call #{index} passed none")]
    MissingCallback {
        mock: String,
        func: String,
        index: usize,
    },

    /// The Nth actual call did not match the Nth expected call.
    #[error(
        "Function {mock}.{func} call #{index} arguments mismatch: expected {expected}, actual {actual}"
    )]
    CallArgumentMismatch {
        mock: String,
        func: String,
        index: usize,
        expected: String,
        actual: String,
    },

    /// The number of actual calls differed from the number of expected calls.
    #[error("Function {mock}.{func} expected {expected} call(s) but was called {actual} time(s)")]
    CallCountMismatch {
        mock: String,
        func: String,
        expected: usize,
        actual: usize,
    },

    /// The finisher was not invoked before the configured timeout elapsed.
    #[error("Finisher was not called within {timeout:?}; the entry point never finished")]
    PendingExecution { timeout: Duration },

    /// The completion signal was dropped without the finisher being called.
    #[error("Completion signal dropped before the finisher was called")]
    FinisherDropped,
}

impl Error {
    /// Returns true for errors detected before the entry point runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingEntryPoint
                | Error::MissingInputParams
                | Error::HttpReqUndefined
                | Error::HttpRequestArray { .. }
                | Error::EmptyFunctionName { .. }
                | Error::EmptyMockName
                | Error::MissingFinisher
                | Error::ExactlyOneResponseFinisher { .. }
                | Error::MultipleFinishers { .. }
                | Error::DuplicateMock { .. }
        )
    }

    /// Returns true for post-execution verification failures.
    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            Error::CallArgumentMismatch { .. } | Error::CallCountMismatch { .. }
        )
    }
}

/// Result type alias for Maddox operations.
pub type Result<T> = std::result::Result<T, Error>;
