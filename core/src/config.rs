//! Client configuration and its builder.
//!
//! # Design
//! `ClientConfig` is assembled once by [`EmitKitBuilder`] and never changes
//! afterwards. The API key is the only required input; everything else has a
//! default. [`EmitKitBuilder::from_env`] reads the same settings from
//! `EMITKIT_*` environment variables.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::EmitKit;
use crate::error::ConfigError;
use crate::transport::{ReqwestTransport, Transport};

pub const DEFAULT_BASE_URL: &str = "https://api.emitkit.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_ENV: &str = "EMITKIT_API_KEY";
pub const BASE_URL_ENV: &str = "EMITKIT_BASE_URL";
pub const TIMEOUT_MS_ENV: &str = "EMITKIT_TIMEOUT_MS";

/// Immutable settings owned by an [`EmitKit`] client.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) transport: Arc<dyn Transport>,
}

impl ClientConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EmitKit`].
pub struct EmitKitBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl EmitKitBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            transport: None,
        }
    }

    /// Start from `EMITKIT_API_KEY`, `EMITKIT_BASE_URL` and
    /// `EMITKIT_TIMEOUT_MS`. Only the API key is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| ConfigError::MissingEnv { name: API_KEY_ENV })?;
        let mut builder = Self::new(api_key);

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        if let Ok(raw) = std::env::var(TIMEOUT_MS_ENV) {
            let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                name: TIMEOUT_MS_ENV,
                value: raw.clone(),
            })?;
            builder = builder.timeout(Duration::from_millis(millis));
        }
        Ok(builder)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default timeout for every call; [`RequestOptions::timeout`] overrides
    /// it per call.
    ///
    /// [`RequestOptions::timeout`]: crate::RequestOptions::timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the default `reqwest` transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<EmitKit, ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let config = ClientConfig {
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            transport,
        };
        Ok(EmitKit::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let client = EmitKitBuilder::new("emitkit_test").build().unwrap();
        assert_eq!(client.config().base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.config().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = EmitKitBuilder::new("emitkit_test")
            .base_url("https://api.test.com/")
            .build()
            .unwrap();
        assert_eq!(client.config().base_url(), "https://api.test.com");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = EmitKitBuilder::new("  ").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = EmitKitBuilder::new("emitkit_secret").build().unwrap();
        let rendered = format!("{:?}", client.config());
        assert!(!rendered.contains("emitkit_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    /// Serializes tests that touch process-wide `EMITKIT_*` variables.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock();
        for name in [API_KEY_ENV, BASE_URL_ENV, TIMEOUT_MS_ENV] {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            if let Some(value) = value {
                std::env::set_var(name, value);
            }
        }
        let result = f();
        for name in [API_KEY_ENV, BASE_URL_ENV, TIMEOUT_MS_ENV] {
            std::env::remove_var(name);
        }
        result
    }

    #[test]
    fn from_env_reads_all_settings() {
        let client = with_env(
            &[
                (API_KEY_ENV, Some("emitkit_env_key")),
                (BASE_URL_ENV, Some("https://api.test.com/")),
                (TIMEOUT_MS_ENV, Some(" 2500 ")),
            ],
            || EmitKitBuilder::from_env().unwrap().build().unwrap(),
        );
        assert_eq!(client.config().api_key, "emitkit_env_key");
        assert_eq!(client.config().base_url(), "https://api.test.com");
        assert_eq!(client.config().timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn from_env_without_overrides_uses_defaults() {
        let client = with_env(&[(API_KEY_ENV, Some("emitkit_env_key"))], || {
            EmitKit::from_env().unwrap()
        });
        assert_eq!(client.config().base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.config().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn from_env_requires_api_key() {
        let err = with_env(&[(TIMEOUT_MS_ENV, Some("1000"))], || EmitKitBuilder::from_env().err());
        let err = err.expect("missing key must fail");
        assert!(matches!(err, ConfigError::MissingEnv { name } if name == API_KEY_ENV));
    }

    #[test]
    fn from_env_rejects_unparseable_timeout() {
        let err = with_env(
            &[(API_KEY_ENV, Some("emitkit_env_key")), (TIMEOUT_MS_ENV, Some("30s"))],
            || EmitKitBuilder::from_env().err(),
        );
        match err.expect("bad timeout must fail") {
            ConfigError::InvalidEnv { name, value } => {
                assert_eq!(name, TIMEOUT_MS_ENV);
                assert_eq!(value, "30s");
            }
            other => panic!("expected invalid env error, got {other:?}"),
        }
    }
}
