//! Scenario specialization for HTTP request handlers.
//!
//! The handler receives the request arguments followed by a mocked response
//! object. Exactly one response-ending call (`send`, `json`, ... as listed in
//! the configuration) must be expected; calling it finishes the scenario.

use crate::config::MaddoxConfig;
use crate::registry::MockObject;
use crate::scenario::{PerfReport, Scenario, ScenarioReport};
use crate::value::MockValue;
use maddox_proto::preconditions::{
    check_argument, should_be_array, should_be_defined, should_be_string,
};
use maddox_proto::{Error, FunctionName, MockId, Result, ReturnKind};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A scenario whose entry point is an HTTP request handler.
#[derive(Debug)]
pub struct HttpReqScenario {
    scenario: Scenario,
    response_id: MockId,
    response: MockObject,
    finisher_set: bool,
}

impl HttpReqScenario {
    /// Creates a new HTTP scenario with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(name, MaddoxConfig::default())
    }

    /// Creates a new HTTP scenario with the given configuration.
    pub fn from_config(name: impl Into<String>, config: MaddoxConfig) -> Self {
        let response_id = config.response_mock_id();
        let scenario = Scenario::from_config(name, config);
        let response = scenario.mock(response_id.clone());
        Self {
            scenario,
            response_id,
            response,
            finisher_set: false,
        }
    }

    /// Returns the mocked response object passed as the handler's last argument.
    pub fn response(&self) -> MockObject {
        self.response.clone()
    }

    /// Returns a stub target for another collaborator the handler uses.
    pub fn mock(&self, mock: impl Into<MockId>) -> MockObject {
        self.scenario.mock(mock)
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Sets the handler under test.
    pub fn with_entry_point<F>(mut self, entry_point: F) -> Self
    where
        F: Fn(Vec<MockValue>) + Send + Sync + 'static,
    {
        self.scenario = self.scenario.with_entry_point(entry_point);
        self
    }

    /// Sets an async handler; each run spawns it on the tokio runtime.
    pub fn with_async_entry_point<F, Fut>(mut self, entry_point: F) -> Self
    where
        F: Fn(Vec<MockValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.scenario = self.scenario.with_async_entry_point(entry_point);
        self
    }

    /// Sets the request arguments passed ahead of the response mock.
    ///
    /// `request` must be a JSON array; each element becomes one argument.
    pub fn with_http_request(mut self, request: Value) -> Result<Self> {
        should_be_array(
            &request,
            Error::HttpRequestArray {
                got: request.to_string(),
            },
        )?;

        let params = match request {
            Value::Array(items) => items.into_iter().map(MockValue::Data).collect(),
            _ => Vec::new(),
        };
        self.scenario.set_input_params(params);
        Ok(self)
    }

    /// Sets the handler arguments directly, for requests carrying callbacks or mocks.
    pub fn with_input_params(mut self, params: Vec<MockValue>) -> Self {
        self.scenario.set_input_params(params);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.scenario = self.scenario.with_timeout(timeout);
        self
    }

    /// Expects the next call of `response.func` to receive `params`.
    ///
    /// When `func` is a response finisher it also becomes the scenario's
    /// finisher and returns the response mock; only one may be expected.
    pub fn res_should_be_called_with(
        mut self,
        func: impl Into<FunctionName>,
        params: Vec<MockValue>,
    ) -> Result<Self> {
        let func = func.into();
        should_be_string(
            func.as_str(),
            Error::EmptyFunctionName {
                context: "res_should_be_called_with",
            },
        )?;

        let registry = self.scenario.registry().clone();
        registry.mock_this_function_at_most_once(self.response_id.clone(), func.clone())?;
        registry.should_be_called_with(self.response_id.clone(), func.clone(), params);

        if self.scenario.config().is_response_finisher(func.as_str()) {
            let existing = registry
                .finisher()
                .map(|(mock, f)| format!("{}.{}", mock, f))
                .unwrap_or_default();
            check_argument(
                !self.finisher_set,
                Error::MultipleFinishers {
                    existing,
                    mock: self.response_id.to_string(),
                    func: func.to_string(),
                },
            )?;

            registry.set_response_end_function(self.response_id.clone(), func.clone())?;
            registry.does_return(
                self.response_id.clone(),
                func.clone(),
                MockValue::Object(self.response.clone()),
                ReturnKind::Synchronous,
            );
            self.finisher_set = true;
            debug!(func = %func, "Response finisher expected");
        }

        Ok(self)
    }

    /// Returns `value` from the next call of `response.func`.
    pub fn res_does_return(
        self,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.res_returns(func, value.into(), false)
    }

    /// Returns `value` from every call of `response.func`.
    pub fn res_does_always_return(
        self,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.res_returns(func, value.into(), true)
    }

    /// Makes `response.func` return the response mock, for chained calls
    /// like `res.status(200).send(body)`.
    pub fn res_does_return_self(self, func: impl Into<FunctionName>) -> Result<Self> {
        let value = MockValue::Object(self.response.clone());
        self.res_returns(func, value, false)
    }

    fn res_returns(
        self,
        func: impl Into<FunctionName>,
        value: MockValue,
        always: bool,
    ) -> Result<Self> {
        let func = func.into();
        should_be_string(
            func.as_str(),
            Error::EmptyFunctionName {
                context: "res_does_return",
            },
        )?;

        let registry = self.scenario.registry();
        registry.mock_this_function_at_most_once(self.response_id.clone(), func.clone())?;
        if always {
            registry.does_always_return(self.response_id.clone(), func, value, ReturnKind::Synchronous);
        } else {
            registry.does_return(self.response_id.clone(), func, value, ReturnKind::Synchronous);
        }
        Ok(self)
    }

    /// Mocks `func` on another collaborator; registering it again fails.
    pub fn mock_this_function(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
    ) -> Result<Self> {
        self.scenario = self.scenario.mock_this_function(mock, func)?;
        Ok(self)
    }

    pub fn should_be_called_with(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        args: Vec<MockValue>,
    ) -> Result<Self> {
        self.scenario = self.scenario.should_be_called_with(mock, func, args)?;
        Ok(self)
    }

    pub fn does_return(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self.scenario.does_return(mock, func, value)?;
        Ok(self)
    }

    pub fn does_return_with_callback(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self.scenario.does_return_with_callback(mock, func, value)?;
        Ok(self)
    }

    pub fn does_return_with_promise(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self.scenario.does_return_with_promise(mock, func, value)?;
        Ok(self)
    }

    pub fn does_always_return(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self.scenario.does_always_return(mock, func, value)?;
        Ok(self)
    }

    pub fn does_always_return_with_callback(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self
            .scenario
            .does_always_return_with_callback(mock, func, value)?;
        Ok(self)
    }

    pub fn does_always_return_with_promise(
        mut self,
        mock: impl Into<MockId>,
        func: impl Into<FunctionName>,
        value: impl Into<MockValue>,
    ) -> Result<Self> {
        self.scenario = self
            .scenario
            .does_always_return_with_promise(mock, func, value)?;
        Ok(self)
    }

    /// Checks the configuration before the handler can run.
    pub fn validate(&self) -> Result<()> {
        check_argument(self.scenario.has_entry_point(), Error::MissingEntryPoint)?;
        should_be_defined(self.scenario.input_params(), Error::HttpReqUndefined)?;
        check_argument(
            self.finisher_set,
            Error::ExactlyOneResponseFinisher {
                known: self.scenario.config().known_finishers(),
            },
        )?;
        Ok(())
    }

    /// Runs the handler with the response mock appended to the request
    /// arguments, waits for the response finisher, and verifies all mocks.
    pub async fn test(&self) -> Result<ScenarioReport> {
        self.validate()?;
        self.scenario
            .execute(vec![MockValue::Object(self.response.clone())])
            .await
    }

    /// Runs `samples` handler executions without rebuilding the scenario.
    pub async fn perf_test(&self, samples: usize) -> Result<PerfReport> {
        self.validate()?;
        self.scenario
            .sample(vec![MockValue::Object(self.response.clone())], samples)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::registry::StubTarget;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn response_arg(args: &[MockValue]) -> MockObject {
        args.last()
            .and_then(MockValue::as_object)
            .cloned()
            .expect("handler receives the response mock last")
    }

    #[tokio::test]
    async fn test_handler_sends_response() {
        let report = HttpReqScenario::new("send body")
            .with_entry_point(|args| {
                let res = response_arg(&args);
                let body = args[0].as_data().unwrap()["body"].clone();
                res.invoke("send", vec![MockValue::Data(body)]).unwrap();
            })
            .with_http_request(json!([{"body": {"name": "ada"}}]))
            .unwrap()
            .res_should_be_called_with("send", args![json!({"name": "ada"})])
            .unwrap()
            .test()
            .await
            .unwrap();

        assert_eq!(report.call_count("HttpResponseMock", "send"), 1);
    }

    #[tokio::test]
    async fn test_chained_status_then_json() {
        let scenario = HttpReqScenario::new("chain");
        let expected_res = scenario.response();

        scenario
            .with_entry_point(move |args| {
                let res = response_arg(&args);
                let chained = res.call("status", args![200]).unwrap();
                let chained = chained.as_object().unwrap();
                assert!(chained.same_object(&expected_res));
                chained.invoke("json", args![json!({"ok": true})]).unwrap();
            })
            .with_http_request(json!([]))
            .unwrap()
            .res_does_return_self("status")
            .unwrap()
            .res_should_be_called_with("status", args![200])
            .unwrap()
            .res_should_be_called_with("json", args![json!({"ok": true})])
            .unwrap()
            .test()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finisher_returns_response_mock() {
        let scenario = HttpReqScenario::new("finisher returns self");
        let res = scenario.response();
        let scenario = scenario
            .with_entry_point(|_| {})
            .with_http_request(json!([]))
            .unwrap()
            .res_should_be_called_with("end", args![])
            .unwrap();

        let returned = res.call("end", args![]).unwrap();
        assert!(returned.as_object().unwrap().same_object(&res));
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_second_finisher_rejected() {
        let err = HttpReqScenario::new("two finishers")
            .res_should_be_called_with("send", args!["a"])
            .unwrap()
            .res_should_be_called_with("json", args!["b"])
            .unwrap_err();
        assert!(matches!(err, Error::MultipleFinishers { .. }));

        let err = HttpReqScenario::new("same finisher twice")
            .res_should_be_called_with("send", args!["a"])
            .unwrap()
            .res_should_be_called_with("send", args!["b"])
            .unwrap_err();
        assert!(matches!(err, Error::MultipleFinishers { .. }));
    }

    #[test]
    fn test_http_request_must_be_array() {
        let err = HttpReqScenario::new("object request")
            .with_http_request(json!({"body": {}}))
            .unwrap_err();
        assert!(matches!(err, Error::HttpRequestArray { .. }));
    }

    #[tokio::test]
    async fn test_validation_order() {
        let err = HttpReqScenario::new("empty").test().await.unwrap_err();
        assert_eq!(err, Error::MissingEntryPoint);

        let err = HttpReqScenario::new("no request")
            .with_entry_point(|_| {})
            .test()
            .await
            .unwrap_err();
        assert_eq!(err, Error::HttpReqUndefined);

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let err = HttpReqScenario::new("no finisher")
            .with_entry_point(move |_| ran_clone.store(true, Ordering::SeqCst))
            .with_http_request(json!([]))
            .unwrap()
            .res_should_be_called_with("status", args![404])
            .unwrap()
            .test()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExactlyOneResponseFinisher { .. }));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_custom_finisher_names() {
        let yaml = "response_mock_name: \"reply\"\nresponse_end_functions:\n  done: true\n";
        let config = MaddoxConfig::from_yaml_str(yaml).unwrap();

        let report = HttpReqScenario::from_config("custom", config)
            .with_entry_point(|args| {
                response_arg(&args).invoke("done", args![]).unwrap();
            })
            .with_http_request(json!([]))
            .unwrap()
            .res_should_be_called_with("done", args![])
            .unwrap()
            .test()
            .await
            .unwrap();

        assert_eq!(report.call_count("reply", "done"), 1);
    }

    #[tokio::test]
    async fn test_res_does_return_values() {
        HttpReqScenario::new("headers")
            .with_entry_point(|args| {
                let res = response_arg(&args);
                assert_eq!(res.call("get", args!["a"]).unwrap(), MockValue::from("1"));
                assert_eq!(res.call("get", args!["b"]).unwrap(), MockValue::from("2"));
                assert_eq!(res.call("get", args!["c"]).unwrap(), MockValue::from("2"));
                res.invoke("end", args![]).unwrap();
            })
            .with_http_request(json!([]))
            .unwrap()
            .res_does_return("get", "1")
            .unwrap()
            .res_does_always_return("get", "2")
            .unwrap()
            .res_should_be_called_with("end", args![])
            .unwrap()
            .test()
            .await
            .unwrap();
    }
}
