//! HTTP delivery of encoded batches, with bounded retry.
//!
//! The transport owns the underlying HTTP client. It is constructed once
//! from the validated configuration, moved into the dispatcher thread, and
//! dropped when that thread exits, which releases the connection pool.
//!
//! Delivery outcomes are classified per attempt: a 2xx status is success,
//! a 429 or 5xx status and any transport-level failure are retryable, and
//! every other status is a permanent rejection. Retries wait a doubling
//! backoff, capped at the configured maximum and jittered to avoid
//! synchronized storms, unless the server named its own delay with a
//! `Retry-After` header.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect;

use crate::compress::EncodedBody;
use crate::config::ClientConfig;
use crate::error::{ConfigError, WriteError};

/// Blocking HTTP transport for the write endpoint.
#[derive(Debug)]
pub(crate) struct HttpTransport {
    http: reqwest::blocking::Client,
    write_url: String,
    query: Vec<(&'static str, String)>,
    max_retries: u32,
    retry_backoff: Duration,
    max_retry_delay: Duration,
}

impl HttpTransport {
    /// Builds the transport from a validated configuration.
    ///
    /// The write URL and query string are fixed here; `org` is omitted when
    /// the organization is empty, and the `Authorization` header is omitted
    /// when the token is empty.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(config)?);
        if !config.allow_http_redirects {
            builder = builder.redirect(redirect::Policy::none());
        }
        if config.disable_certificate_validation {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ConfigError::InvalidProxy {
                url: proxy.clone(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::ClientCreate { source: e })?;

        let mut query = Vec::new();
        if !config.organization.is_empty() {
            query.push(("org", config.organization.clone()));
        }
        query.push(("bucket", config.database.clone()));
        query.push(("precision", config.effective_precision().as_str().to_string()));

        Ok(Self {
            http,
            write_url: format!("{}api/v2/write", config.host),
            query,
            max_retries: config.write_options.max_retries,
            retry_backoff: config.write_options.retry_backoff,
            max_retry_delay: config.write_options.max_retry_delay,
        })
    }

    /// Sends one batch body, retrying retryable failures up to the
    /// configured bound.
    ///
    /// `lines` is the record count of the batch, carried into error values
    /// so callers can report how much data a failed delivery dropped.
    pub fn send(&self, body: &EncodedBody, lines: usize) -> Result<(), WriteError> {
        let mut backoff = self.retry_backoff;
        let mut server_wait: Option<Duration> = None;
        let mut last_failure: Option<WriteError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let wait = match server_wait.take() {
                    Some(wait) => wait,
                    None => {
                        let wait = jittered(backoff.min(self.max_retry_delay));
                        backoff = backoff.saturating_mul(2);
                        wait
                    }
                };
                tracing::debug!("retry {attempt}/{} after {wait:?}", self.max_retries);
                std::thread::sleep(wait);
            }

            let mut request = self.http.post(&self.write_url).query(&self.query);
            if body.compressed {
                request = request.header(header::CONTENT_ENCODING, "gzip");
            }

            match request.body(body.bytes.clone()).send() {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if !is_retryable_status(status) {
                        return Err(WriteError::ServerRejected {
                            status,
                            body: resp.text().unwrap_or_default(),
                            lines,
                        });
                    }
                    server_wait = parse_retry_after(resp.headers());
                    let body = resp.text().unwrap_or_default();
                    tracing::warn!("write attempt {attempt} got status {status}: {body}");
                    last_failure = Some(WriteError::HttpStatus { status, body });
                }
                Err(e) => {
                    tracing::warn!("write attempt {attempt} failed: {e}");
                    last_failure = Some(WriteError::Transport { source: e });
                }
            }
        }

        Err(WriteError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last: Box::new(last_failure.expect("at least one attempt was made")),
            lines,
        })
    }
}

/// Headers applied to every write request. Configured headers are inserted
/// last, so they win over the built-in ones on name collision.
fn default_headers(config: &ClientConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if !config.token.is_empty() {
        let mut value = HeaderValue::from_str(&format!("Token {}", config.token)).map_err(|_| {
            ConfigError::InvalidHeader {
                name: "Authorization".to_string(),
            }
        })?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// True for statuses worth retrying: 429 and the 5xx range.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Reads an integer-seconds `Retry-After` header. HTTP-date values are
/// ignored and fall back to the computed backoff.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Scales a delay by a uniform random factor in [0.75, 1.25].
fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(0.75 + rand::random::<f64>() * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));

        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(413));
        assert!(!is_retryable_status(422));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_missing() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let base = Duration::from_millis(100);
        for _ in 0..200 {
            let wait = jittered(base);
            assert!(wait >= Duration::from_millis(75), "{wait:?} below bound");
            assert!(wait <= Duration::from_millis(125), "{wait:?} above bound");
        }
    }

    #[test]
    fn test_new_builds_url_and_query() {
        let config = ClientConfig::new("http://localhost:8086")
            .with_organization("my-org")
            .with_database("metrics")
            .validated()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.write_url, "http://localhost:8086/api/v2/write");
        assert_eq!(
            transport.query,
            vec![
                ("org", "my-org".to_string()),
                ("bucket", "metrics".to_string()),
                ("precision", "ns".to_string()),
            ]
        );
    }

    #[test]
    fn test_new_omits_empty_organization() {
        let config = ClientConfig::new("http://localhost:8086")
            .with_database("metrics")
            .validated()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(
            transport.query,
            vec![
                ("bucket", "metrics".to_string()),
                ("precision", "ns".to_string()),
            ]
        );
    }

    #[test]
    fn test_new_rejects_invalid_proxy() {
        let config = ClientConfig::new("http://localhost:8086")
            .with_proxy("not a proxy url")
            .validated()
            .unwrap();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ConfigError::InvalidProxy { .. })
        ));
    }

    #[test]
    fn test_new_rejects_invalid_header_name() {
        let config = ClientConfig::new("http://localhost:8086")
            .with_header("bad name", "value")
            .validated()
            .unwrap();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ConfigError::InvalidHeader { name }) if name == "bad name"
        ));
    }

    #[test]
    fn test_new_rejects_invalid_header_value() {
        let config = ClientConfig::new("http://localhost:8086")
            .with_header("X-Note", "line1\nline2")
            .validated()
            .unwrap();
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ConfigError::InvalidHeader { name }) if name == "X-Note"
        ));
    }
}
