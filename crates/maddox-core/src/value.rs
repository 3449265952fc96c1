//! Dynamic values passed to and returned from mocked functions.
//!
//! Collaborator APIs mocked by a scenario have arbitrary shapes, so arguments
//! and return values are carried as `MockValue`: plain JSON data, an opaque
//! callback, or a handle to a mock object (for self-returning stubs).

use crate::registry::MockObject;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A single-argument callback handed to a mocked function.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(MockValue) + Send + Sync>);

impl Callback {
    /// Wraps a closure as a callback argument.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(MockValue) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the callback with `value`.
    pub fn call(&self, value: MockValue) {
        (self.0)(value);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// An argument passed to, or a value returned from, a mocked function.
#[derive(Debug, Clone, Default)]
pub enum MockValue {
    /// No value.
    #[default]
    Undefined,
    /// Structured data compared by deep equality.
    Data(Value),
    /// A callback; any callback matches any other during verification.
    Callback(Callback),
    /// A handle to a mock object, compared by identity.
    Object(MockObject),
}

impl MockValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, MockValue::Undefined)
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            MockValue::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            MockValue::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&MockObject> {
        match self {
            MockValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for MockValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MockValue::Undefined, MockValue::Undefined) => true,
            (MockValue::Data(a), MockValue::Data(b)) => a == b,
            (MockValue::Callback(_), MockValue::Callback(_)) => true,
            (MockValue::Object(a), MockValue::Object(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl fmt::Display for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockValue::Undefined => f.write_str("undefined"),
            MockValue::Data(v) => write!(f, "{}", v),
            MockValue::Callback(_) => f.write_str("[callback]"),
            MockValue::Object(obj) => write!(f, "[mock {}]", obj.id()),
        }
    }
}

/// Renders an argument list as `[a,b,c]` for error messages.
pub fn render_args(args: &[MockValue]) -> String {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(","))
}

impl From<Value> for MockValue {
    fn from(v: Value) -> Self {
        MockValue::Data(v)
    }
}

impl From<&str> for MockValue {
    fn from(s: &str) -> Self {
        MockValue::Data(Value::from(s))
    }
}

impl From<String> for MockValue {
    fn from(s: String) -> Self {
        MockValue::Data(Value::from(s))
    }
}

impl From<bool> for MockValue {
    fn from(b: bool) -> Self {
        MockValue::Data(Value::from(b))
    }
}

impl From<i32> for MockValue {
    fn from(n: i32) -> Self {
        MockValue::Data(Value::from(n))
    }
}

impl From<i64> for MockValue {
    fn from(n: i64) -> Self {
        MockValue::Data(Value::from(n))
    }
}

impl From<u64> for MockValue {
    fn from(n: u64) -> Self {
        MockValue::Data(Value::from(n))
    }
}

impl From<f64> for MockValue {
    fn from(n: f64) -> Self {
        MockValue::Data(Value::from(n))
    }
}

impl From<Callback> for MockValue {
    fn from(cb: Callback) -> Self {
        MockValue::Callback(cb)
    }
}

impl From<MockObject> for MockValue {
    fn from(obj: MockObject) -> Self {
        MockValue::Object(obj)
    }
}

/// Builds a `Vec<MockValue>` from a list of convertible expressions.
///
/// ```
/// use maddox_core::{MockValue, args};
///
/// let list = args![200, "ok", serde_json::json!({"id": 1})];
/// assert_eq!(list.len(), 3);
/// assert_eq!(list[0], MockValue::from(200));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::MockValue>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::MockValue::from($arg)),+]
    };
}

/// A future returned by a deferred stub.
///
/// It is always pending on its first poll and settles with the configured
/// value on a later one, so callers observe the value only after yielding.
pub struct Deferred {
    inner: BoxFuture<'static, MockValue>,
}

impl Deferred {
    pub(crate) fn settle_later(value: MockValue) -> Self {
        let inner = async move {
            tokio::task::yield_now().await;
            value
        }
        .boxed();
        Self { inner }
    }
}

impl Future for Deferred {
    type Output = MockValue;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred")
    }
}

/// What a stub hands back to its caller.
#[derive(Debug)]
pub enum Returned {
    /// Synchronous delivery of the configured value.
    Value(MockValue),
    /// The value was passed to the caller's callback argument.
    Delivered,
    /// A future that settles with the value on a later poll.
    Deferred(Deferred),
    /// No return value was configured for this call.
    Nothing,
}

impl Returned {
    /// Returns the synchronous value, or `MockValue::Undefined` otherwise.
    pub fn into_value(self) -> MockValue {
        match self {
            Returned::Value(v) => v,
            _ => MockValue::Undefined,
        }
    }

    /// Returns the deferred future, if this was a deferred delivery.
    pub fn into_deferred(self) -> Option<Deferred> {
        match self {
            Returned::Deferred(d) => Some(d),
            _ => None,
        }
    }

    /// Resolves the delivered value, awaiting a deferred future if needed.
    pub async fn resolve(self) -> MockValue {
        match self {
            Returned::Value(v) => v,
            Returned::Deferred(d) => d.await,
            Returned::Delivered | Returned::Nothing => MockValue::Undefined,
        }
    }
}
