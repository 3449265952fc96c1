//! Per-function record of expected calls, actual calls, and queued returns.

use crate::value::{Deferred, MockValue, Returned, render_args};
use maddox_proto::{Error, FunctionName, MockId, Result, ReturnKind};

/// A configured value plus the style used to deliver it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnDescriptor {
    pub kind: ReturnKind,
    pub value: MockValue,
    /// Reused for every invocation instead of being consumed once.
    pub always: bool,
}

impl ReturnDescriptor {
    pub fn new(value: MockValue, kind: ReturnKind, always: bool) -> Self {
        Self {
            kind,
            value,
            always,
        }
    }

    /// Delivers the value to the caller according to `kind`.
    ///
    /// Asynchronous delivery invokes the last callback found in `args`.
    pub(crate) fn deliver(
        self,
        mock: &MockId,
        func: &FunctionName,
        index: usize,
        args: &[MockValue],
    ) -> Result<Returned> {
        match self.kind {
            ReturnKind::Synchronous => Ok(Returned::Value(self.value)),
            ReturnKind::Asynchronous => {
                let callback = args
                    .iter()
                    .rev()
                    .find_map(MockValue::as_callback)
                    .ok_or_else(|| Error::MissingCallback {
                        mock: mock.to_string(),
                        func: func.to_string(),
                        index,
                    })?;
                callback.call(self.value);
                Ok(Returned::Delivered)
            }
            ReturnKind::Deferred => Ok(Returned::Deferred(Deferred::settle_later(self.value))),
        }
    }
}

/// How a ledger entry was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Repeated at-most-once registrations are no-ops.
    AtMostOnce,
    /// Any further registration is rejected.
    Exclusive,
}

/// Expected vs. actual calls and queued return values for one mocked function.
#[derive(Debug, Clone, Default)]
pub struct LedgerEntry {
    registration: Option<Registration>,
    expected_calls: Vec<Vec<MockValue>>,
    actual_calls: Vec<Vec<MockValue>>,
    one_shot: Vec<ReturnDescriptor>,
    always: Option<ReturnDescriptor>,
    /// Index of the next unconsumed one-shot descriptor.
    cursor: usize,
    is_finisher: bool,
}

impl LedgerEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    pub fn registration(&self) -> Option<Registration> {
        self.registration
    }

    pub(crate) fn register(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    pub fn is_finisher(&self) -> bool {
        self.is_finisher
    }

    pub(crate) fn mark_finisher(&mut self) {
        self.is_finisher = true;
    }

    pub fn expected_calls(&self) -> &[Vec<MockValue>] {
        &self.expected_calls
    }

    pub fn actual_calls(&self) -> &[Vec<MockValue>] {
        &self.actual_calls
    }

    pub fn call_count(&self) -> usize {
        self.actual_calls.len()
    }

    /// Appends the arguments expected for the next call.
    pub fn record_expected_call(&mut self, args: Vec<MockValue>) {
        self.expected_calls.push(args);
    }

    /// Queues a return descriptor.
    ///
    /// One-shot descriptors are consumed in configured order. An `always`
    /// descriptor replaces any earlier one and applies once the one-shot
    /// queue is drained.
    pub fn record_return(&mut self, descriptor: ReturnDescriptor) {
        if descriptor.always {
            self.always = Some(descriptor);
        } else {
            self.one_shot.push(descriptor);
        }
    }

    /// Records an actual call and returns its zero-based index.
    pub fn record_call(&mut self, args: Vec<MockValue>) -> usize {
        self.actual_calls.push(args);
        self.actual_calls.len() - 1
    }

    /// Takes the descriptor for the next invocation, if any.
    pub fn next_return(&mut self) -> Option<ReturnDescriptor> {
        if let Some(descriptor) = self.one_shot.get(self.cursor) {
            self.cursor += 1;
            return Some(descriptor.clone());
        }
        self.always.clone()
    }

    /// Clears actual calls and rewinds the return queue.
    pub fn reset(&mut self) {
        self.actual_calls.clear();
        self.cursor = 0;
    }

    /// Compares actual calls against expected calls.
    ///
    /// Entries without any expectation are not checked.
    pub fn verify(&self, mock: &MockId, func: &FunctionName) -> Result<()> {
        if self.expected_calls.is_empty() {
            return Ok(());
        }

        for (index, (expected, actual)) in self
            .expected_calls
            .iter()
            .zip(self.actual_calls.iter())
            .enumerate()
        {
            if expected != actual {
                return Err(Error::CallArgumentMismatch {
                    mock: mock.to_string(),
                    func: func.to_string(),
                    index,
                    expected: render_args(expected),
                    actual: render_args(actual),
                });
            }
        }

        if self.expected_calls.len() != self.actual_calls.len() {
            return Err(Error::CallCountMismatch {
                mock: mock.to_string(),
                func: func.to_string(),
                expected: self.expected_calls.len(),
                actual: self.actual_calls.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn ids() -> (MockId, FunctionName) {
        (MockId::new("math"), FunctionName::new("f"))
    }

    fn sync(value: i32, always: bool) -> ReturnDescriptor {
        ReturnDescriptor::new(MockValue::from(value), ReturnKind::Synchronous, always)
    }

    #[test]
    fn test_one_shot_returns_in_order_then_nothing() {
        let mut entry = LedgerEntry::new();
        entry.record_return(sync(1, false));
        entry.record_return(sync(2, false));

        assert_eq!(entry.next_return().unwrap().value, MockValue::from(1));
        assert_eq!(entry.next_return().unwrap().value, MockValue::from(2));
        assert!(entry.next_return().is_none());
    }

    #[test]
    fn test_always_return_repeats() {
        let mut entry = LedgerEntry::new();
        entry.record_return(sync(9, true));

        for _ in 0..5 {
            assert_eq!(entry.next_return().unwrap().value, MockValue::from(9));
        }
    }

    #[test]
    fn test_one_shot_drains_before_always() {
        let mut entry = LedgerEntry::new();
        entry.record_return(sync(9, true));
        entry.record_return(sync(1, false));

        assert_eq!(entry.next_return().unwrap().value, MockValue::from(1));
        assert_eq!(entry.next_return().unwrap().value, MockValue::from(9));
        assert_eq!(entry.next_return().unwrap().value, MockValue::from(9));
    }

    #[test]
    fn test_verify_matching_calls() {
        let (mock, func) = ids();
        let mut entry = LedgerEntry::new();
        entry.record_expected_call(args![1, 2]);
        entry.record_expected_call(args![3, 4]);
        entry.record_call(args![1, 2]);
        entry.record_call(args![3, 4]);

        assert!(entry.verify(&mock, &func).is_ok());
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let (mock, func) = ids();
        let mut entry = LedgerEntry::new();
        entry.record_expected_call(args![1, 2]);
        entry.record_expected_call(args![3, 4]);
        entry.record_call(args![1, 2]);
        entry.record_call(args![9, 9]);

        let err = entry.verify(&mock, &func).unwrap_err();
        assert_eq!(
            err,
            Error::CallArgumentMismatch {
                mock: "math".to_string(),
                func: "f".to_string(),
                index: 1,
                expected: "[3,4]".to_string(),
                actual: "[9,9]".to_string(),
            }
        );
    }

    #[test]
    fn test_verify_reports_count_mismatch() {
        let (mock, func) = ids();
        let mut entry = LedgerEntry::new();
        entry.record_expected_call(args![1]);
        entry.record_expected_call(args![2]);
        entry.record_call(args![1]);

        let err = entry.verify(&mock, &func).unwrap_err();
        assert!(matches!(
            err,
            Error::CallCountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_verify_skips_entries_without_expectations() {
        let (mock, func) = ids();
        let mut entry = LedgerEntry::new();
        entry.record_call(args!["anything"]);

        assert!(entry.verify(&mock, &func).is_ok());
    }

    #[test]
    fn test_reset_replays_queue() {
        let mut entry = LedgerEntry::new();
        entry.record_return(sync(1, false));
        entry.record_call(args![]);
        assert!(entry.next_return().is_some());

        entry.reset();

        assert_eq!(entry.call_count(), 0);
        assert_eq!(entry.next_return().unwrap().value, MockValue::from(1));
    }

    #[test]
    fn test_asynchronous_delivery_without_callback_fails() {
        let (mock, func) = ids();
        let descriptor =
            ReturnDescriptor::new(MockValue::from(1), ReturnKind::Asynchronous, false);

        let err = descriptor.deliver(&mock, &func, 0, &args![1]).unwrap_err();
        assert!(matches!(err, Error::MissingCallback { index: 0, .. }));
    }
}
