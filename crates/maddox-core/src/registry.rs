//! Mock registry: ledger entries keyed by mock and function name.
//!
//! The registry owns every `LedgerEntry` for one scenario, the finisher
//! designation, and the completion callback fired when the finisher is
//! invoked. It is a cloneable handle so stubs can be called from tasks the
//! entry point spawns.

use crate::ledger::{LedgerEntry, Registration, ReturnDescriptor};
use crate::value::{MockValue, Returned};
use maddox_proto::preconditions::should_be_string;
use maddox_proto::{Error, FunctionName, MockId, Result, ReturnKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

/// Type alias for the completion callback.
type OnFinish = Box<dyn FnOnce() + Send + 'static>;

type EntryKey = (MockId, FunctionName);

#[derive(Default)]
struct RegistryState {
    entries: BTreeMap<EntryKey, LedgerEntry>,
    finisher: Option<EntryKey>,
    on_finish: Option<OnFinish>,
    /// Failures raised inside stubs, reported again at verification.
    failures: Vec<Error>,
}

impl RegistryState {
    fn entry_mut(&mut self, mock: &MockId, func: &FunctionName) -> &mut LedgerEntry {
        self.entries
            .entry((mock.clone(), func.clone()))
            .or_default()
    }
}

/// Central store of mocked functions for one scenario.
#[derive(Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockRegistry")
            .field("entries", &state.entries.len())
            .field("finisher", &state.finisher)
            .field("awaiting_finish", &state.on_finish.is_some())
            .finish()
    }
}

impl MockRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a stub target for `mock`.
    ///
    /// Only functions registered through one of the `mock_this_function*`
    /// methods can be invoked on it.
    pub fn mock_object(&self, mock: impl Into<MockId>) -> MockObject {
        MockObject {
            registry: Arc::downgrade(&self.state),
            id: mock.into(),
        }
    }

    /// Registers `func` on `mock`, rejecting any later registration.
    pub fn mock_this_function(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<MockObject> {
        self.register(mock.into(), func.into(), Registration::Exclusive)
    }

    /// Registers `func` on `mock` unless it already is.
    ///
    /// Repeated calls reuse the existing stub. Fails only when the function
    /// was registered exclusively through `mock_this_function`.
    pub fn mock_this_function_at_most_once(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<MockObject> {
        self.register(mock.into(), func.into(), Registration::AtMostOnce)
    }

    fn register(
        &self,
        mock: MockId,
        func: FunctionName,
        registration: Registration,
    ) -> Result<MockObject> {
        should_be_string(mock.as_str(), Error::EmptyMockName)?;
        should_be_string(
            func.as_str(),
            Error::EmptyFunctionName {
                context: "mock registration",
            },
        )?;

        {
            let mut state = self.lock();
            let entry = state.entry_mut(&mock, &func);
            match (entry.registration(), registration) {
                (None, _) => {
                    entry.register(registration);
                    debug!(mock = %mock, func = %func, ?registration, "Mocked function");
                }
                (Some(Registration::AtMostOnce), Registration::AtMostOnce) => {}
                (Some(_), _) => {
                    return Err(Error::DuplicateMock {
                        mock: mock.to_string(),
                        func: func.to_string(),
                    });
                }
            }
        }

        Ok(self.mock_object(mock))
    }

    /// Appends the arguments expected for the next call of `func`.
    pub fn should_be_called_with(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        args: Vec<MockValue>,
    ) {
        let (mock, func) = (mock.into(), func.into());
        let mut state = self.lock();
        let entry = state.entry_mut(&mock, &func);
        entry.record_expected_call(args);
        debug!(
            mock = %mock,
            func = %func,
            expected_calls = entry.expected_calls().len(),
            "Recorded expected call"
        );
    }

    /// Queues a one-shot return value.
    pub fn does_return(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: MockValue,
        kind: ReturnKind,
    ) {
        self.record_return(mock.into(), func.into(), ReturnDescriptor::new(value, kind, false));
    }

    /// Sets a return value used for every call once one-shot values run out.
    pub fn does_always_return(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: MockValue,
        kind: ReturnKind,
    ) {
        self.record_return(mock.into(), func.into(), ReturnDescriptor::new(value, kind, true));
    }

    fn record_return(&self, mock: MockId, func: FunctionName, descriptor: ReturnDescriptor) {
        debug!(
            mock = %mock,
            func = %func,
            kind = %descriptor.kind,
            always = descriptor.always,
            "Recorded return value"
        );
        self.lock().entry_mut(&mock, &func).record_return(descriptor);
    }

    /// Marks `func` as the call that ends the unit under test.
    ///
    /// Marking the same function twice is a no-op; marking a different one
    /// fails with `MultipleFinishers`.
    pub fn set_response_end_function(
        &self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<()> {
        let key = (mock.into(), func.into());
        let mut state = self.lock();

        if let Some(existing) = &state.finisher {
            if *existing == key {
                return Ok(());
            }
            return Err(Error::MultipleFinishers {
                existing: format!("{}.{}", existing.0, existing.1),
                mock: key.0.to_string(),
                func: key.1.to_string(),
            });
        }

        state.entry_mut(&key.0, &key.1).mark_finisher();
        debug!(mock = %key.0, func = %key.1, "Designated finisher");
        state.finisher = Some(key);
        Ok(())
    }

    /// Stores the callback fired the next time the finisher is invoked.
    ///
    /// Replaces any callback left over from a previous execution.
    pub fn set_callback_for_response_end<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().on_finish = Some(Box::new(callback));
    }

    /// Returns true if a finisher has been designated.
    pub fn has_finisher(&self) -> bool {
        self.lock().finisher.is_some()
    }

    /// Returns the designated finisher, if any.
    pub fn finisher(&self) -> Option<(MockId, FunctionName)> {
        self.lock().finisher.clone()
    }

    /// Returns true if the designated finisher is also a mocked function.
    ///
    /// An unregistered finisher fails with `NotMocked` when invoked, so the
    /// execution waiting on it would never resolve.
    pub fn finisher_is_registered(&self) -> bool {
        let state = self.lock();
        state
            .finisher
            .as_ref()
            .and_then(|key| state.entries.get(key))
            .is_some_and(LedgerEntry::is_registered)
    }

    /// Returns the first failure raised inside a stub since the last reset.
    pub fn first_failure(&self) -> Option<Error> {
        self.lock().failures.first().cloned()
    }

    /// Invokes the stub for `mock.func`.
    ///
    /// Records the call, delivers the next return value, and fires the
    /// completion callback when `func` is the finisher. Callbacks run after
    /// the registry lock is released, so they may call other stubs.
    pub fn invoke(
        &self,
        mock: &MockId,
        func: &FunctionName,
        args: Vec<MockValue>,
    ) -> Result<Returned> {
        let (index, descriptor, is_finisher) = {
            let mut state = self.lock();
            let key = (mock.clone(), func.clone());
            if !state
                .entries
                .get(&key)
                .is_some_and(LedgerEntry::is_registered)
            {
                let err = Error::NotMocked {
                    mock: mock.to_string(),
                    func: func.to_string(),
                };
                state.failures.push(err.clone());
                return Err(err);
            }

            let entry = state.entry_mut(mock, func);
            let index = entry.record_call(args.clone());
            (index, entry.next_return(), entry.is_finisher())
        };

        debug!(mock = %mock, func = %func, call = index, finisher = is_finisher, "Mock invoked");

        let result = match descriptor {
            Some(descriptor) => descriptor.deliver(mock, func, index, &args),
            None => {
                warn!(mock = %mock, func = %func, call = index, "No return value configured");
                Ok(Returned::Nothing)
            }
        };

        if let Err(err) = &result {
            self.lock().failures.push(err.clone());
        }

        if is_finisher {
            self.finish();
        }

        result
    }

    fn finish(&self) {
        let on_finish = self.lock().on_finish.take();
        match on_finish {
            Some(callback) => {
                debug!("Finisher called, resolving execution");
                callback();
            }
            None => debug!("Finisher called with no pending execution"),
        }
    }

    /// Verifies every ledger entry, in mock/function order.
    ///
    /// A failure raised inside a stub during execution takes precedence.
    pub fn verify_all(&self) -> Result<()> {
        if let Some(err) = self.first_failure() {
            return Err(err);
        }
        let state = self.lock();
        for ((mock, func), entry) in &state.entries {
            entry.verify(mock, func)?;
        }
        Ok(())
    }

    /// Clears actual calls and rewinds every return queue.
    pub fn reset(&self) {
        let mut state = self.lock();
        for entry in state.entries.values_mut() {
            entry.reset();
        }
        state.failures.clear();
    }

    /// Returns the number of times `mock.func` was invoked.
    pub fn call_count(&self, mock: &MockId, func: &FunctionName) -> usize {
        self.lock()
            .entries
            .get(&(mock.clone(), func.clone()))
            .map_or(0, LedgerEntry::call_count)
    }

    /// Returns the recorded arguments for each invocation of `mock.func`.
    pub fn actual_calls(&self, mock: &MockId, func: &FunctionName) -> Vec<Vec<MockValue>> {
        self.lock()
            .entries
            .get(&(mock.clone(), func.clone()))
            .map(|entry| entry.actual_calls().to_vec())
            .unwrap_or_default()
    }

    /// Returns a copy of every ledger entry.
    pub fn snapshot(&self) -> Vec<(MockId, FunctionName, LedgerEntry)> {
        self.lock()
            .entries
            .iter()
            .map(|((mock, func), entry)| (mock.clone(), func.clone(), entry.clone()))
            .collect()
    }
}

/// Something whose functions can be invoked by name.
///
/// Code under test reaches its collaborators through its own traits; test
/// adapters implement those traits by forwarding to a `StubTarget`.
pub trait StubTarget {
    fn invoke(&self, func: &str, args: Vec<MockValue>) -> Result<Returned>;
}

/// A collaborator object whose functions are stubs backed by a registry.
#[derive(Clone)]
pub struct MockObject {
    registry: Weak<Mutex<RegistryState>>,
    id: MockId,
}

impl MockObject {
    pub fn id(&self) -> &MockId {
        &self.id
    }

    /// Returns true if both handles name the same mock in the same registry.
    pub fn same_object(&self, other: &MockObject) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.registry, &other.registry)
    }

    /// Invokes `func` and returns its synchronous value.
    ///
    /// Non-synchronous deliveries yield `MockValue::Undefined`.
    pub fn call(&self, func: &str, args: Vec<MockValue>) -> Result<MockValue> {
        self.invoke(func, args).map(Returned::into_value)
    }

    fn registry(&self) -> Result<MockRegistry> {
        self.registry
            .upgrade()
            .map(|state| MockRegistry { state })
            .ok_or_else(|| Error::MockDetached {
                mock: self.id.to_string(),
            })
    }
}

impl StubTarget for MockObject {
    fn invoke(&self, func: &str, args: Vec<MockValue>) -> Result<Returned> {
        self.registry()?
            .invoke(&self.id, &FunctionName::from(func), args)
    }
}

impl fmt::Debug for MockObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockObject").field("id", &self.id).finish()
    }
}
