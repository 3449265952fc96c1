//! End-to-end scenarios for an HTTP handler with callback and promise collaborators.
//!
//! The handler talks to its store through the `UserStore` trait; the test
//! adapter forwards every call to a mocked `StubTarget`.

use futures::FutureExt;
use futures::future::BoxFuture;
use maddox_core::{
    Callback, Error, HttpReqScenario, MaddoxConfig, MockObject, MockValue, StubTarget, args,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

trait UserStore: Send + Sync {
    /// Looks up a user by email and passes it (or null) to `done`.
    fn find(&self, email: &str, done: Callback);

    /// Inserts a user and resolves with the stored record.
    fn insert(&self, user: Value) -> BoxFuture<'static, Value>;
}

struct MockStore(MockObject);

impl UserStore for MockStore {
    fn find(&self, email: &str, done: Callback) {
        self.0.invoke("find", args![email, done]).unwrap();
    }

    fn insert(&self, user: Value) -> BoxFuture<'static, Value> {
        let returned = self.0.invoke("insert", args![user]).unwrap();
        async move {
            returned
                .resolve()
                .await
                .as_data()
                .cloned()
                .unwrap_or(Value::Null)
        }
        .boxed()
    }
}

fn reply(res: &MockObject, status: u16, body: Value) {
    let chained = res.call("status", args![u64::from(status)]).unwrap();
    chained
        .as_object()
        .expect("status returns the response")
        .invoke("json", args![body])
        .unwrap();
}

/// POST /users: rejects duplicates, otherwise inserts and returns 201.
fn create_user(store: Arc<dyn UserStore>, args: Vec<MockValue>) {
    let req = args[0].as_data().cloned().unwrap_or(Value::Null);
    let res = args
        .last()
        .and_then(MockValue::as_object)
        .cloned()
        .expect("response mock is the last argument");

    let email = req["body"]["email"].as_str().unwrap_or_default().to_string();
    let body = req["body"].clone();
    let store_for_insert = Arc::clone(&store);

    store.find(
        &email,
        Callback::new(move |existing| {
            if existing.as_data().is_some_and(|user| !user.is_null()) {
                reply(&res, 409, json!({"error": "email taken"}));
                return;
            }

            let store = Arc::clone(&store_for_insert);
            let res = res.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let created = store.insert(body).await;
                reply(&res, 201, created);
            });
        }),
    );
}

fn scenario(name: &str) -> HttpReqScenario {
    maddox_core::logging::init();

    let scenario = HttpReqScenario::new(name).with_timeout(Duration::from_secs(5));
    let store: Arc<dyn UserStore> = Arc::new(MockStore(scenario.mock("UserStore")));

    scenario
        .with_entry_point(move |args| create_user(Arc::clone(&store), args))
        .with_http_request(json!([{"body": {"email": "ada@example.com", "name": "Ada"}}]))
        .unwrap()
        .mock_this_function("UserStore", "find")
        .unwrap()
        .mock_this_function("UserStore", "insert")
        .unwrap()
        .res_does_return_self("status")
        .unwrap()
}

#[tokio::test]
async fn test_creates_new_user() {
    let stored = json!({"id": 1, "email": "ada@example.com", "name": "Ada"});

    let report = scenario("creates user")
        .should_be_called_with(
            "UserStore",
            "find",
            args!["ada@example.com", Callback::new(|_| {})],
        )
        .unwrap()
        .does_return_with_callback("UserStore", "find", Value::Null)
        .unwrap()
        .should_be_called_with(
            "UserStore",
            "insert",
            args![json!({"email": "ada@example.com", "name": "Ada"})],
        )
        .unwrap()
        .does_return_with_promise("UserStore", "insert", stored.clone())
        .unwrap()
        .res_should_be_called_with("status", args![201])
        .unwrap()
        .res_should_be_called_with("json", args![stored])
        .unwrap()
        .test()
        .await
        .unwrap();

    assert_eq!(report.call_count("UserStore", "insert"), 1);
    assert_eq!(report.call_count("HttpResponseMock", "json"), 1);
}

#[tokio::test]
async fn test_rejects_existing_user() {
    let report = scenario("duplicate email")
        .does_return_with_callback("UserStore", "find", json!({"id": 1}))
        .unwrap()
        .res_should_be_called_with("status", args![409])
        .unwrap()
        .res_should_be_called_with("json", args![json!({"error": "email taken"})])
        .unwrap()
        .test()
        .await
        .unwrap();

    assert_eq!(report.call_count("UserStore", "insert"), 0);
}

#[tokio::test]
async fn test_wrong_status_is_reported() {
    let err = scenario("wrong status")
        .does_return_with_callback("UserStore", "find", json!({"id": 1}))
        .unwrap()
        .res_should_be_called_with("status", args![400])
        .unwrap()
        .res_should_be_called_with("json", args![json!({"error": "email taken"})])
        .unwrap()
        .test()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::CallArgumentMismatch {
            mock: "HttpResponseMock".to_string(),
            func: "status".to_string(),
            index: 0,
            expected: "[400]".to_string(),
            actual: "[409]".to_string(),
        }
    );
}

#[tokio::test]
async fn test_perf_samples_rerun_handler() {
    let report = scenario("perf")
        .does_always_return_with_callback("UserStore", "find", json!({"id": 1}))
        .unwrap()
        .res_should_be_called_with("status", args![409])
        .unwrap()
        .res_should_be_called_with("json", args![json!({"error": "email taken"})])
        .unwrap()
        .perf_test(10)
        .await
        .unwrap();

    assert_eq!(report.len(), 10);
}

#[tokio::test]
async fn test_finisher_table_from_config_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("maddox.yml");
    std::fs::write(
        &path,
        "response_mock_name: \"reply\"\nresponse_end_functions:\n  respond: true\nfinish_timeout_ms: 50\n",
    )?;
    let config = MaddoxConfig::from_file(&path)?;
    assert!(config.validate()?.is_empty());

    let err = HttpReqScenario::from_config("never responds", config)
        .with_entry_point(|_| {})
        .with_http_request(json!([]))?
        .res_should_be_called_with("respond", args![])?
        .test()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::PendingExecution {
            timeout: Duration::from_millis(50)
        }
    );
    Ok(())
}
