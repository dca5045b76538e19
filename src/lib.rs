//! `clover-http` is the resilient HTTP layer behind every Clover API call.
//!
//! A [`Client`] issues one logical request per call and:
//! - retries transport failures and unexpected statuses with capped
//!   exponential backoff ([`RetryPolicy`]);
//! - classifies failures into a closed set ([`ClassifiedError`]), surfacing
//!   400/401/403/404 immediately;
//! - applies a caller-supplied transform exactly once to the successful
//!   response ([`response::json`], [`response::text`], or any closure).
//!
//! ```no_run
//! use clover_http::{response, Client, ErrorKind, RequestOptions};
//!
//! # async fn run() -> clover_http::Result<()> {
//! let client = Client::new()?;
//! let url = "http://localhost:5000/categories/groceries";
//! match client.get(url, response::json::<serde_json::Value>(), RequestOptions::new()).await {
//!     Ok(category) => println!("{category}"),
//!     Err(err) if err.kind() == Some(ErrorKind::NotFound) => {
//!         let _: serde_json::Value = client
//!             .post_json(
//!                 "http://localhost:5000/categories",
//!                 &serde_json::json!({"name": "groceries", "display_name": "Groceries"}),
//!             )
//!             .await?;
//!     }
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod options;
mod request;
pub mod response;
mod retry;
mod transport;

pub use client::Client;
pub use error::{BoxError, ClassifiedError, Diagnostic, Error, ErrorKind, TransportFailureKind};
pub use options::{ClientOptions, RequestOptions};
pub use request::{Method, Request, Timeouts};
pub use response::{handle_response, Response};
pub use retry::{RetryPolicy, RetryPredicate};
pub use tokio_util::sync::CancellationToken;
pub use transport::{ReqwestTransport, Transport, TransportFailure};

pub type Result<T> = std::result::Result<T, Error>;
