//! The `EmitKit` client and its resource-scoped sub-APIs.
//!
//! # Design
//! `EmitKit` owns the configuration and the last-known rate-limit snapshot.
//! It is cheap to clone: clones share both through `Arc`, so every clone
//! observes the same snapshot. The `events()` and `identity()` handles borrow
//! the client and forward straight to [`RequestExecutor::send`]; they add no
//! validation of their own and leave payload checks to the server.

use std::sync::Arc;

use crate::config::{ClientConfig, EmitKitBuilder};
use crate::error::{ConfigError, Result};
use crate::executor::RequestExecutor;
use crate::http::HttpMethod;
use crate::options::{ApiResponse, RequestOptions};
use crate::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::types::{CreateEvent, Event, Identify, Identity};

pub const EVENTS_PATH: &str = "/v1/events";
pub const IDENTIFY_PATH: &str = "/v1/identify";

/// Client for the EmitKit API.
#[derive(Debug, Clone)]
pub struct EmitKit {
    config: Arc<ClientConfig>,
    rate_limit: Arc<RateLimitTracker>,
    executor: RequestExecutor,
}

impl EmitKit {
    /// Client with default settings and the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> EmitKitBuilder {
        EmitKitBuilder::new(api_key)
    }

    /// Client configured from `EMITKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        EmitKitBuilder::from_env()?.build()
    }

    pub(crate) fn from_config(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        let rate_limit = Arc::new(RateLimitTracker::new());
        let executor = RequestExecutor::new(Arc::clone(&config), Arc::clone(&rate_limit));
        Self {
            config,
            rate_limit,
            executor,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Rate-limit state from the most recent response that reported one.
    /// `None` until such a response has been seen.
    pub fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.rate_limit.latest()
    }

    /// Lower-level access for endpoints without a typed wrapper.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn events(&self) -> Events<'_> {
        Events { client: self }
    }

    pub fn identity(&self) -> Identities<'_> {
        Identities { client: self }
    }
}

/// Event operations.
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    client: &'a EmitKit,
}

impl Events<'_> {
    pub async fn create(&self, event: &CreateEvent) -> Result<ApiResponse<Event>> {
        self.create_with_options(event, &RequestOptions::default()).await
    }

    /// Create an event. Pass an idempotency key in `options` to make retries
    /// safe.
    pub async fn create_with_options(
        &self,
        event: &CreateEvent,
        options: &RequestOptions,
    ) -> Result<ApiResponse<Event>> {
        self.client
            .executor
            .send(HttpMethod::Post, EVENTS_PATH, Some(event), options)
            .await
    }
}

/// Identity operations.
#[derive(Debug, Clone, Copy)]
pub struct Identities<'a> {
    client: &'a EmitKit,
}

impl Identities<'_> {
    pub async fn identify(&self, payload: &Identify) -> Result<ApiResponse<Identity>> {
        self.identify_with_options(payload, &RequestOptions::default()).await
    }

    /// Create or update a user identity and attach aliases.
    ///
    /// A 2xx response can still report failed aliases; inspect
    /// [`Identity::aliases`] rather than relying on an error.
    pub async fn identify_with_options(
        &self,
        payload: &Identify,
        options: &RequestOptions,
    ) -> Result<ApiResponse<Identity>> {
        self.client
            .executor
            .send(HttpMethod::Post, IDENTIFY_PATH, Some(payload), options)
            .await
    }
}
