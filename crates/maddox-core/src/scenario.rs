//! Scenario definition and execution.
//!
//! A `Scenario` binds an entry point, its input params, and a `MockRegistry`
//! for one test case. Running it validates the configuration, invokes the
//! entry point, waits until the designated finisher is called, and then
//! verifies every mocked function's expected calls.

use crate::config::MaddoxConfig;
use crate::registry::{MockObject, MockRegistry};
use crate::value::MockValue;
use futures::FutureExt;
use futures::future::BoxFuture;
use maddox_proto::preconditions::{check_argument, should_be_defined, should_be_string};
use maddox_proto::{Error, FunctionName, MockId, Result, ReturnKind};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// The function under test. Receives the full argument list.
pub type EntryPoint = Arc<dyn Fn(Vec<MockValue>) + Send + Sync>;

/// Zero-argument thunk that runs the entry point and resolves on finish.
pub type TestRunnable = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callback signalling that one perf sample finished.
pub type SampleDone = Box<dyn FnOnce() + Send + 'static>;

/// Runs one perf sample; `SampleDone` fires when the finisher is called.
pub type PerfRunnable = Box<dyn Fn(SampleDone) + Send + Sync>;

/// A single test case: entry point, input params, and mocks.
pub struct Scenario {
    name: String,
    config: MaddoxConfig,
    registry: MockRegistry,
    entry_point: Option<EntryPoint>,
    input_params: Option<Vec<MockValue>>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .field("has_entry_point", &self.entry_point.is_some())
            .field("input_params", &self.input_params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Scenario {
    /// Creates a new scenario with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(name, MaddoxConfig::default())
    }

    /// Creates a new scenario with the given configuration.
    pub fn from_config(name: impl Into<String>, config: MaddoxConfig) -> Self {
        Self {
            name: name.into(),
            timeout: config.finish_timeout(),
            config,
            registry: MockRegistry::new(),
            entry_point: None,
            input_params: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MaddoxConfig {
        &self.config
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    /// Returns a stub target for `mock` to hand to the code under test.
    pub fn mock(&self, mock: impl Into<MockId>) -> MockObject {
        self.registry.mock_object(mock)
    }

    /// Sets the function under test.
    pub fn with_entry_point<F>(mut self, entry_point: F) -> Self
    where
        F: Fn(Vec<MockValue>) + Send + Sync + 'static,
    {
        self.entry_point = Some(Arc::new(entry_point));
        self
    }

    /// Sets an async function under test; each run spawns it on the tokio runtime.
    ///
    /// Running the scenario then panics outside a runtime.
    pub fn with_async_entry_point<F, Fut>(mut self, entry_point: F) -> Self
    where
        F: Fn(Vec<MockValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.entry_point = Some(Arc::new(move |args| {
            tokio::spawn(entry_point(args));
        }));
        self
    }

    /// Sets the ordered arguments passed to the entry point.
    pub fn with_input_params(mut self, params: Vec<MockValue>) -> Self {
        self.input_params = Some(params);
        self
    }

    /// Fails `test` if the finisher is not called within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn has_entry_point(&self) -> bool {
        self.entry_point.is_some()
    }

    pub(crate) fn input_params(&self) -> Option<&Vec<MockValue>> {
        self.input_params.as_ref()
    }

    pub(crate) fn set_input_params(&mut self, params: Vec<MockValue>) {
        self.input_params = Some(params);
    }

    /// Mocks `func` on `mock`; registering it again fails.
    pub fn mock_this_function(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<Self> {
        self.registry.mock_this_function(mock, func)?;
        Ok(self)
    }

    /// Expects the next call of `mock.func` to receive `args`.
    pub fn should_be_called_with(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        args: Vec<MockValue>,
    ) -> Result<Self> {
        let func = func.into();
        should_be_string(
            func.as_str(),
            Error::EmptyFunctionName {
                context: "should_be_called_with",
            },
        )?;
        self.registry.should_be_called_with(mock, func, args);
        Ok(self)
    }

    /// Returns `value` directly from the next call.
    pub fn does_return(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Synchronous, false)
    }

    /// Passes `value` to the callback argument of the next call.
    pub fn does_return_with_callback(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Asynchronous, false)
    }

    /// Returns a future settling with `value` from the next call.
    pub fn does_return_with_promise(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Deferred, false)
    }

    /// Returns `value` directly from every call once one-shot values run out.
    pub fn does_always_return(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Synchronous, true)
    }

    pub fn does_always_return_with_callback(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Asynchronous, true)
    }

    pub fn does_always_return_with_promise(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.returns(mock, func, value, ReturnKind::Deferred, true)
    }

    fn returns(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
        kind: ReturnKind,
        always: bool,
    ) -> Result<Self> {
        let func = func.into();
        should_be_string(
            func.as_str(),
            Error::EmptyFunctionName {
                context: "does_return",
            },
        )?;
        if always {
            self.registry.does_always_return(mock, func, value.into(), kind);
        } else {
            self.registry.does_return(mock, func, value.into(), kind);
        }
        Ok(self)
    }

    /// Designates `mock.func` as the call that ends the unit under test.
    pub fn set_finisher(
        self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<Self> {
        self.registry.set_response_end_function(mock, func)?;
        Ok(self)
    }

    /// Checks the configuration before the entry point can run.
    pub fn validate(&self) -> Result<()> {
        check_argument(self.has_entry_point(), Error::MissingEntryPoint)?;
        should_be_defined(self.input_params(), Error::MissingInputParams)?;
        check_argument(self.registry.finisher_is_registered(), Error::MissingFinisher)?;
        Ok(())
    }

    fn entry_point(&self) -> Result<EntryPoint> {
        self.entry_point.clone().ok_or(Error::MissingEntryPoint)
    }

    /// Input params followed by `trailing`.
    fn full_args(&self, trailing: Vec<MockValue>) -> Vec<MockValue> {
        let mut args = self.input_params.clone().unwrap_or_default();
        args.extend(trailing);
        args
    }

    /// Builds the thunk that runs the entry point once with `args`.
    ///
    /// Each call installs a fresh completion callback, invokes the entry
    /// point synchronously, and returns a future resolved by the finisher.
    ///
    /// The thunk must be called inside a tokio runtime when the entry point
    /// was set with `with_async_entry_point`, since each run spawns a task.
    pub fn test_runnable(&self, args: Vec<MockValue>) -> Result<TestRunnable> {
        let entry_point = self.entry_point()?;
        let registry = self.registry.clone();

        Ok(Box::new(move || {
            let (tx, rx) = oneshot::channel();
            registry.set_callback_for_response_end(move || {
                let _ = tx.send(());
            });

            entry_point(args.clone());

            async move { rx.await.map_err(|_| Error::FinisherDropped) }.boxed()
        }))
    }

    /// Builds the runnable used for repeated perf samples.
    ///
    /// Each call installs `sample_done` as the completion callback, resets
    /// recorded calls and return queues, and re-invokes the entry point.
    /// Like `test_runnable`, it must run inside a tokio runtime when the
    /// entry point is async.
    pub fn perf_runnable(&self, args: Vec<MockValue>) -> Result<PerfRunnable> {
        let entry_point = self.entry_point()?;
        let registry = self.registry.clone();

        Ok(Box::new(move |sample_done: SampleDone| {
            registry.set_callback_for_response_end(sample_done);
            registry.reset();
            entry_point(args.clone());
        }))
    }

    /// Waits for the finisher.
    ///
    /// If the wait times out or the signal is dropped, a failure raised
    /// inside a stub during the run is reported in its place.
    async fn await_finish(&self, pending: BoxFuture<'static, Result<()>>) -> Result<()> {
        let finished = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .unwrap_or(Err(Error::PendingExecution { timeout })),
            None => pending.await,
        };
        finished.map_err(|err| self.registry.first_failure().unwrap_or(err))
    }

    /// Validates, runs the entry point until the finisher is called, and
    /// verifies every mocked function.
    pub async fn test(&self) -> Result<ScenarioReport> {
        self.validate()?;
        self.execute(Vec::new()).await
    }

    /// Runs `samples` executions without rebuilding the scenario.
    ///
    /// Expected calls are not verified while sampling.
    pub async fn perf_test(&self, samples: usize) -> Result<PerfReport> {
        self.validate()?;
        self.sample(Vec::new(), samples).await
    }

    pub(crate) async fn execute(&self, trailing: Vec<MockValue>) -> Result<ScenarioReport> {
        let runnable = self.test_runnable(self.full_args(trailing))?;

        debug!(scenario = %self.name, "Running entry point");
        self.await_finish(runnable()).await?;
        debug!(scenario = %self.name, "Finisher called, verifying mocks");

        self.registry.verify_all()?;
        Ok(ScenarioReport::from_registry(&self.name, &self.registry))
    }

    pub(crate) async fn sample(
        &self,
        trailing: Vec<MockValue>,
        samples: usize,
    ) -> Result<PerfReport> {
        let runnable = self.perf_runnable(self.full_args(trailing))?;
        let mut durations = Vec::with_capacity(samples);

        for sample in 0..samples {
            let (tx, rx) = oneshot::channel();
            let started = Instant::now();
            runnable(Box::new(move || {
                let _ = tx.send(());
            }));
            self.await_finish(async move { rx.await.map_err(|_| Error::FinisherDropped) }.boxed())
                .await?;
            let elapsed = started.elapsed();
            debug!(scenario = %self.name, sample, elapsed_us = elapsed.as_micros() as u64, "Sample done");
            durations.push(elapsed);
        }

        let report = PerfReport::new(durations);
        info!(
            scenario = %self.name,
            samples = report.len(),
            mean_us = report.mean().as_micros() as u64,
            "Perf test complete"
        );
        Ok(report)
    }
}

/// Calls recorded for one mocked function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub mock: MockId,
    pub func: FunctionName,
    pub calls: Vec<Vec<MockValue>>,
    pub is_finisher: bool,
}

/// Outcome of a successful `test` run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub records: Vec<CallRecord>,
}

impl ScenarioReport {
    fn from_registry(name: &str, registry: &MockRegistry) -> Self {
        let records = registry
            .snapshot()
            .into_iter()
            .map(|(mock, func, entry)| CallRecord {
                mock,
                func,
                calls: entry.actual_calls().to_vec(),
                is_finisher: entry.is_finisher(),
            })
            .collect();
        Self {
            name: name.to_string(),
            records,
        }
    }

    /// Returns the arguments of every call to `mock.func`.
    pub fn calls_for(&self, mock: &str, func: &str) -> &[Vec<MockValue>] {
        self.records
            .iter()
            .find(|r| r.mock.as_str() == mock && r.func.as_str() == func)
            .map_or(&[][..], |r| r.calls.as_slice())
    }

    pub fn call_count(&self, mock: &str, func: &str) -> usize {
        self.calls_for(mock, func).len()
    }
}

/// Timings from a `perf_test` run.
#[derive(Debug, Clone, Default)]
pub struct PerfReport {
    samples: Vec<Duration>,
}

impl PerfReport {
    pub fn new(samples: Vec<Duration>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    pub fn min(&self) -> Duration {
        self.samples.iter().min().copied().unwrap_or_default()
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().max().copied().unwrap_or_default()
    }
}
