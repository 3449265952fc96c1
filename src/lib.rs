//! # maddox
//!
//! Behavioral test doubles for request handlers.
//!
//! Re-exports the engine from `maddox-core` and the shared vocabulary from
//! `maddox-proto`.
//!
//! ```
//! use maddox::{HttpReqScenario, StubTarget, args};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> maddox::Result<()> {
//! let report = HttpReqScenario::new("greets by name")
//!     .with_entry_point(|args| {
//!         let name = args[0].as_data().unwrap()["params"]["name"].clone();
//!         let res = args[1].as_object().unwrap().clone();
//!         let greeting = format!("hello {}", name.as_str().unwrap());
//!         res.call("status", args![200])
//!             .unwrap()
//!             .as_object()
//!             .unwrap()
//!             .invoke("send", args![greeting])
//!             .unwrap();
//!     })
//!     .with_http_request(json!([{"params": {"name": "ada"}}]))?
//!     .res_does_return_self("status")?
//!     .res_should_be_called_with("status", args![200])?
//!     .res_should_be_called_with("send", args!["hello ada"])?
//!     .test()
//!     .await?;
//!
//! assert_eq!(report.call_count("HttpResponseMock", "send"), 1);
//! # Ok(())
//! # }
//! ```

pub use maddox_core::*;
pub use maddox_proto::preconditions;
