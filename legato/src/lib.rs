//! # legato
//!
//! Batching line-protocol write client for time-series databases.
//!
//! legato writes time-series points to an InfluxDB-compatible HTTP API.
//! Points are encoded into line protocol as they are submitted, accumulate
//! in an in-memory batch, and are delivered by a background dispatcher, so
//! the write path never blocks on the network under normal operation.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Non-blocking writes: points are validated, encoded, and buffered inline;
//!   delivery happens on a background thread
//! - Batches flush on accumulated size, on a time interval, and on explicit
//!   flush or close, whichever fires first
//! - Bounded memory: the dispatch queue applies backpressure to writers
//!   instead of growing without limit
//! - Gzip compression of batch bodies past a configurable threshold
//! - Bounded retries with doubling, jittered backoff, honoring `Retry-After`
//! - Thread-safe: all methods take `&self`, so one client can be shared
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use legato::{Client, ClientConfig, Point, Precision, WriteOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Configure the target server and batching behavior
//! let config = ClientConfig::new("http://localhost:8086")
//!     .with_token("my-token")
//!     .with_database("metrics")
//!     .with_write_options(WriteOptions::new().with_precision(Precision::Millisecond));
//!
//! // Construction validates the configuration and starts the pipeline
//! let client = Client::new(config)?;
//!
//! // Writes return as soon as the point is buffered
//! client.write(
//!     &Point::new("cpu")
//!         .tag("host", "web1")
//!         .field("usage", 42.5)
//!         .timestamp(1_640_000_000_000),
//! )?;
//!
//! // Block until everything submitted so far is delivered
//! client.flush()?;
//!
//! // Deliver remaining data and shut the pipeline down
//! client.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Client`]: top-level handle; buffers points and delivers batches in
//!   the background
//! - [`ClientConfig`] / [`WriteOptions`]: immutable configuration, validated
//!   at client construction
//! - [`Point`]: one measurement with tags, fields, and an optional timestamp
//! - [`Precision`]: timestamp unit points are interpreted in
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`client`]: client lifecycle, write, flush, close
//! - [`config`]: connection settings and write pipeline options
//! - [`point`]: point model, field values, timestamp precision
//! - [`protocol`]: line protocol encoding and escaping
//! - [`error`]: error types

mod buffer;
pub mod client;
mod compress;
pub mod config;
pub mod error;
pub mod point;
pub mod protocol;
mod transport;

// Re-export primary API types at crate root for convenience.
pub use client::Client;
pub use config::{ClientConfig, WriteOptions};
pub use error::{LegatoError, Result};
pub use point::{FieldValue, Point, Precision};
