//! # fetchwrap - layered HTTP calls on top of `reqwest`
//!
//! fetchwrap runs every HTTP call through one pipeline: client and call
//! options are merged, the URL is resolved from a base and a path template,
//! JSON bodies are serialized, request interceptors run, the request is sent
//! with retries and a timeout, the response body is decoded by its content
//! type, the status is classified and response interceptors run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetchwrap::Client;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchwrap::Error> {
//!     // Defaults shared by every call
//!     let client = Client::builder()
//!         .base_url("https://api.example.com/v1/")?
//!         .timeout(Duration::from_secs(30))
//!         .retry(3)
//!         .build()?;
//!
//!     // GET https://api.example.com/v1/users/123
//!     let user = client.get("users/{id}").param("id", 123).send_json::<User>().await?;
//!     println!("User: {}", user.body.name);
//!     println!("Request took {:?}", user.latency);
//!
//!     // POST with a JSON body
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created = client.post("users").json(&new_user).send_json::<User>().await?;
//!     println!("Created user with ID: {}", created.body.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Options
//!
//! Options set on the [`ClientBuilder`] are the client layer; options set on
//! a [`CallBuilder`] (or passed to [`Client::call`]) are the call layer.
//! Scalars from the call layer win, maps such as query params and headers
//! merge key by key, and interceptors run client first.
//!
//! | Option | Default |
//! |---|---|
//! | `parse` | `true` |
//! | `timeout` | none |
//! | `timeout_reset` | `false` |
//! | `retry` | `0` |
//! | `retry_delay` | `[100, 200, 400, 800, 1600]` ms |
//! | `retry_status` | `[408, 425, 429, 5]` |
//! | `status` | `[2]` |
//!
//! A single digit in a status list stands for the whole block, so `5` means
//! any `5xx`.
//!
//! ## Error Handling
//!
//! ```no_run
//! use fetchwrap::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get("/endpoint").send().await {
//!     Ok(response) => println!("Success: {:?}", response.body),
//!     Err(Error::Status { response }) => {
//!         eprintln!("HTTP error {}: {:?}", response.status, response.body);
//!     }
//!     Err(e) if e.is_timeout() => eprintln!("Timed out"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Transport failures, timeouts and aborts are never retried; only responses
//! whose status matches `retry_status` are.

mod cancel;
mod client;
mod codec;
mod error;
pub mod interceptor;
pub mod options;
mod request;
pub mod resolve;
mod response;
pub mod retry;
pub mod status;

pub use cancel::AbortSignal;
pub use client::{CallBuilder, Client, ClientBuilder};
pub use codec::{Blob, Body, FormData, FormValue, Payload, RawBody, OCTET_STREAM};
pub use error::{Error, Result};
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use options::{Options, Params, Settings};
pub use request::{Request, RequestBody};
pub use response::Response;
pub use retry::{RetryDelay, RetryPolicy};
pub use status::StatusMatcher;
pub use tokio_util::sync::CancellationToken;
