//! Async client for the EmitKit event-tracking API.
//!
//! # Overview
//! Submit events and user identities over HTTP and get typed results back.
//! Every response updates the client's last-known rate-limit snapshot, and
//! idempotency keys make manual retries safe.
//!
//! ```no_run
//! use emitkit::{CreateEvent, EmitKit, RequestOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EmitKit::new("emitkit_xxxxxxxxxxxxxxxxxxxxx")?;
//!
//! let event = CreateEvent::new("payments", "Payment Received").metadata("amount", 99.99);
//! let options = RequestOptions::new().idempotency_key("payment-123-webhook");
//! let created = client.events().create_with_options(&event, &options).await?;
//!
//! println!("{} (replayed: {})", created.data.id, created.was_replayed);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - One call is one HTTP request. Nothing is retried automatically; failed
//!   calls come back as an [`Error`] carrying what a caller needs to decide
//!   on a retry (status, request id, rate-limit reset, field errors).
//! - The network sits behind the [`Transport`] trait, injected at
//!   construction. [`ReqwestTransport`] is the default.
//! - The rate-limit snapshot is a single slot per client; concurrent calls
//!   overwrite it, last writer wins.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod options;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{EmitKit, Events, Identities};
pub use config::{ClientConfig, EmitKitBuilder};
pub use error::{ConfigError, Error, ErrorKind, FieldError, GenericError, RateLimitError, Result, ValidationError};
pub use executor::RequestExecutor;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use options::{ApiResponse, RequestOptions};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{AliasFailure, AliasResults, CreateEvent, DisplayAs, Event, Identify, Identity};
