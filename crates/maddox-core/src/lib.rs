//! # maddox-core
//!
//! Behavioral test doubles for verifying how a unit under test (typically an
//! HTTP request handler) calls its collaborators.
//!
//! This crate provides:
//! - The expectation ledger recording expected calls, actual calls, and
//!   queued return values per mocked function
//! - The mock registry and `MockObject` stub targets handed to the code under test
//! - Synchronous, callback, and deferred return delivery
//! - Scenarios that run an entry point until its finisher is called, then verify
//! - An HTTP request scenario wiring a mocked response object into handlers
//! - Configuration of response-ending function names and run timeouts

mod config;
mod http_scenario;
mod ledger;
pub mod logging;
mod registry;
mod scenario;
mod value;

pub use config::{ConfigError, ConfigWarning, MaddoxConfig};
pub use http_scenario::HttpReqScenario;
pub use ledger::{LedgerEntry, Registration, ReturnDescriptor};
pub use maddox_proto::{Error, FunctionName, MockId, Result, ReturnKind};
pub use registry::{MockObject, MockRegistry, StubTarget};
pub use scenario::{
    CallRecord, EntryPoint, PerfReport, PerfRunnable, SampleDone, Scenario, ScenarioReport,
    TestRunnable,
};
pub use value::{Callback, Deferred, MockValue, Returned, render_args};
