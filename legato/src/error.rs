//! Error types for the legato write client.

use thiserror::Error;

/// The main error type for all legato operations.
///
/// This enum covers all possible error conditions, from configuration
/// validation at client construction to encoding and batch delivery at
/// runtime.
#[derive(Error, Debug)]
pub enum LegatoError {
    /// Error validating or loading client configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error encoding a point into line protocol.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Error delivering a batch to the server.
    #[error("write error: {0}")]
    Write(#[from] WriteError),
}

/// Errors that can occur when validating or loading configuration.
///
/// All of these are fatal at client construction; a constructed client
/// never produces them.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The host URL is empty.
    #[error("host URL must not be empty")]
    EmptyHost,

    /// The proxy URL could not be parsed.
    #[error("invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        /// The proxy URL that failed to parse.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A configured HTTP header has an invalid name or value.
    #[error("invalid HTTP header '{name}'")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// Failed to build the underlying HTTP client.
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Failed to spawn a background worker thread.
    #[error("failed to spawn worker thread '{name}': {source}")]
    WorkerSpawn {
        /// The worker thread name.
        name: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a configuration file.
    #[error("failed to load configuration from '{}': {source}", path.display())]
    FileLoad {
        /// The configuration file path.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file.
    #[error("failed to parse configuration from '{}': {source}", path.display())]
    FileParse {
        /// The configuration file path.
        path: std::path::PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while encoding a point.
///
/// A point that fails to encode is rejected before it reaches the buffer,
/// so it never poisons a batch.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// The measurement name is empty.
    #[error("measurement name must not be empty")]
    EmptyMeasurement,

    /// The point has no fields.
    #[error("point '{measurement}' has no fields (at least one is required)")]
    NoFields {
        /// The measurement name of the rejected point.
        measurement: String,
    },

    /// A float field is NaN or infinite, which line protocol cannot represent.
    #[error("field '{field}' has non-finite value {value}")]
    NonFiniteFloat {
        /// The offending field key.
        field: String,
        /// The non-finite value.
        value: f64,
    },

    /// An empty raw record was submitted.
    #[error("raw record must not be empty")]
    EmptyRecord,
}

/// Errors that can occur while delivering a batch.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The HTTP request could not be executed (connection, timeout, protocol).
    #[error("transport failure: {source}")]
    Transport {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server returned a retryable status (429 or 5xx).
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body text.
        body: String,
    },

    /// The server rejected the batch with a non-retryable status.
    ///
    /// The batch is discarded; its data is not re-queued.
    #[error("server rejected batch of {lines} lines with status {status}: {body}")]
    ServerRejected {
        /// The HTTP status code.
        status: u16,
        /// The server-provided diagnostic message.
        body: String,
        /// Number of records in the discarded batch.
        lines: usize,
    },

    /// Retryable failures persisted past the configured attempt bound.
    ///
    /// The batch is discarded; its data is not re-queued.
    #[error("batch of {lines} lines dropped after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts made (initial try plus retries).
        attempts: u32,
        /// The failure observed on the final attempt.
        #[source]
        last: Box<WriteError>,
        /// Number of records in the discarded batch.
        lines: usize,
    },

    /// Gzip compression of the batch body failed.
    #[error("failed to compress batch: {source}")]
    Compression {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The client is closed and no longer accepts points.
    #[error("client is closed")]
    ClientClosed,
}

/// Type alias for `Result<T, LegatoError>`.
pub type Result<T> = std::result::Result<T, LegatoError>;
