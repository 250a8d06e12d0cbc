//! Client configuration: connection settings and write pipeline options.
//!
//! Configuration is consumed by value at client construction, validated
//! once (the host must be non-empty, and gets normalized to end with `/`),
//! and never mutated afterwards. The client keeps its own copy, so changing
//! a [`ClientConfig`] after construction has no effect on a running client.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use legato::config::{ClientConfig, WriteOptions};
//! use legato::point::Precision;
//!
//! let config = ClientConfig::new("http://localhost:8086")
//!     .with_token("my-token")
//!     .with_database("metrics")
//!     .with_write_options(
//!         WriteOptions::new()
//!             .with_precision(Precision::Millisecond)
//!             .with_flush_interval(Duration::from_secs(5)),
//!     );
//! # drop(config);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::point::Precision;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum body size, in bytes, at which batches are gzip-compressed.
pub const DEFAULT_GZIP_THRESHOLD: usize = 1000;

/// Default accumulated batch size, in bytes, that triggers a flush.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Default maximum time records wait in the buffer before a flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of retries after the initial send attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial retry backoff; the delay doubles per attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Default upper bound on the computed retry delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Default bound on batches queued for dispatch before producers block.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Batching, compression, and retry options for the write pipeline.
///
/// Immutable once a client is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Timestamp precision for written points. `None` resolves to
    /// nanoseconds.
    pub precision: Option<Precision>,
    /// Minimum body size, in bytes, at which batches are gzip-compressed.
    /// 0 disables compression.
    pub gzip_threshold: usize,
    /// Accumulated batch size, in bytes, that triggers a flush.
    pub max_batch_bytes: usize,
    /// Maximum time records wait in the buffer before a flush.
    pub flush_interval: Duration,
    /// Tags merged into every written point. Point-level tags win on key
    /// collision.
    pub default_tags: BTreeMap<String, String>,
    /// Number of retries after the initial send attempt.
    pub max_retries: u32,
    /// Initial retry backoff; the delay doubles per attempt.
    pub retry_backoff: Duration,
    /// Upper bound on the computed retry delay.
    pub max_retry_delay: Duration,
    /// Bound on batches queued for dispatch before producers block.
    pub max_in_flight: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            precision: None,
            gzip_threshold: DEFAULT_GZIP_THRESHOLD,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            default_tags: BTreeMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl WriteOptions {
    /// Creates write options with all values at their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timestamp precision.
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Sets the gzip threshold in bytes. 0 disables compression.
    #[must_use]
    pub fn with_gzip_threshold(mut self, threshold: usize) -> Self {
        self.gzip_threshold = threshold;
        self
    }

    /// Sets the batch size limit in bytes.
    #[must_use]
    pub fn with_max_batch_bytes(mut self, bytes: usize) -> Self {
        self.max_batch_bytes = bytes;
        self
    }

    /// Sets the flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Adds a tag merged into every written point.
    #[must_use]
    pub fn with_default_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    /// Sets the number of retries after the initial send attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the upper bound on the computed retry delay.
    #[must_use]
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Sets the bound on batches queued for dispatch.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }
}

/// Connection and write settings for a [`Client`](crate::client::Client).
///
/// Constructed once, validated at client construction (the host must be
/// non-empty), then immutable for the life of the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base server URL, e.g. `http://localhost:8086`. Normalized to end
    /// with `/` during validation.
    pub host: String,
    /// API token. Empty omits the `Authorization` header.
    pub token: String,
    /// Organization name or id. Empty omits the `org` query parameter.
    pub organization: String,
    /// Target database, sent as the `bucket` query parameter.
    pub database: String,
    /// Extra HTTP headers applied to every write request, in order. A
    /// configured header wins over the library's own on name collision.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Duration,
    /// Follow HTTP redirects when true.
    pub allow_http_redirects: bool,
    /// Skip server certificate verification when true. Insecure; intended
    /// only for trusted test environments, never enabled as a fallback.
    pub disable_certificate_validation: bool,
    /// Proxy URL for all write traffic.
    pub proxy: Option<String>,
    /// Batching, compression, and retry options.
    pub write_options: WriteOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            organization: String::new(),
            database: String::new(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            allow_http_redirects: false,
            disable_certificate_validation: false,
            proxy: None,
            write_options: WriteOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `host` with all options at their
    /// defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Loads a JSON configuration file.
    ///
    /// Every field is optional in the file; missing fields fall back to
    /// their defaults. Durations use serde's `{"secs": .., "nanos": ..}`
    /// form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileLoad`] if the file cannot be read and
    /// [`ConfigError::FileParse`] if it is not valid JSON for this type.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::FileParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Sets the API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Sets the organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    /// Sets the target database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Adds an HTTP header applied to every write request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables following HTTP redirects.
    #[must_use]
    pub fn with_allow_http_redirects(mut self, allow: bool) -> Self {
        self.allow_http_redirects = allow;
        self
    }

    /// Enables or disables server certificate verification.
    ///
    /// Disabling is insecure and intended only for trusted test
    /// environments.
    #[must_use]
    pub fn with_disable_certificate_validation(mut self, disable: bool) -> Self {
        self.disable_certificate_validation = disable;
        self
    }

    /// Sets a proxy URL for all write traffic.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the write pipeline options.
    #[must_use]
    pub fn with_write_options(mut self, write_options: WriteOptions) -> Self {
        self.write_options = write_options;
        self
    }

    /// Checks required settings and normalizes the host URL.
    ///
    /// The host must be non-empty; a missing trailing `/` is appended so
    /// endpoint paths can be joined by simple concatenation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyHost`] if the host is empty.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if !self.host.ends_with('/') {
            self.host.push('/');
        }
        Ok(self)
    }

    /// Effective write precision: the explicit setting, or the nanosecond
    /// default.
    pub fn effective_precision(&self) -> Precision {
        self.write_options.precision.unwrap_or_default()
    }
}
