//! Batching write client.
//!
//! [`Client`] is the entry point of the crate. Points submitted through
//! [`Client::write`] are encoded immediately, accumulate in an in-memory
//! buffer, and are delivered in the background as newline-joined batches.
//! A batch is handed off when its accumulated bytes reach the configured
//! limit, when the flush interval elapses, or when [`Client::flush`] or
//! [`Client::close`] runs, whichever fires first.
//!
//! Two background threads do the work: a ticker that fires the interval
//! trigger, and a dispatcher that owns the HTTP transport and delivers
//! hand-offs in submission order. The dispatch queue is bounded by
//! `max_in_flight`; once it fills, hand-offs block the writer, which keeps
//! memory bounded when the server is slow.
//!
//! Delivery failures happen on the dispatcher thread, after the write call
//! that buffered the data has returned. The first unreported failure is
//! kept and returned by the next [`Client::flush`] or [`Client::close`]
//! (or by a write call that itself handed off a batch); every dropped
//! batch is also logged at error level with its line count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::buffer::{Batch, BatchBuffer};
use crate::compress;
use crate::config::ClientConfig;
use crate::error::{ConfigError, EncodingError, Result, WriteError};
use crate::point::Point;
use crate::protocol;
use crate::transport::HttpTransport;

/// Work items consumed by the dispatcher thread, in submission order.
enum Dispatch {
    /// A batch to deliver.
    Batch(Batch),
    /// Flush synchronization. Acknowledged once every earlier batch has
    /// reached a terminal outcome.
    Barrier(Sender<()>),
    /// Final item. Nothing is enqueued after it.
    Shutdown,
}

/// State shared between the client handle and its worker threads.
struct Shared {
    buffer: Mutex<BatchBuffer>,
    dispatch_tx: Sender<Dispatch>,
    closed: AtomicBool,
    pending_error: Mutex<Option<WriteError>>,
}

impl Shared {
    /// Hands the buffer off if the flush interval has elapsed. Called from
    /// the ticker thread.
    fn flush_if_due(&self) {
        let mut buffer = lock_unpoisoned(&self.buffer);
        if self.closed.load(Ordering::SeqCst) || !buffer.interval_due() {
            return;
        }
        if let Some(batch) = buffer.take_batch() {
            let _ = self.dispatch_tx.send(Dispatch::Batch(batch));
        }
    }

    /// Keeps the first delivery failure for the next synchronous call to
    /// surface. Later failures are already logged by the dispatcher.
    fn record_error(&self, error: WriteError) {
        lock_unpoisoned(&self.pending_error).get_or_insert(error);
    }

    fn take_pending_error(&self) -> Option<WriteError> {
        lock_unpoisoned(&self.pending_error).take()
    }
}

/// A thread-safe, batching line-protocol write client.
///
/// Construction validates the configuration, builds the HTTP transport,
/// and starts the worker threads. The client can be shared across threads
/// behind an `Arc`, or used from one thread directly; all methods take
/// `&self`.
///
/// Dropping the client closes it, blocking until buffered data is
/// delivered or has failed terminally. Call [`Client::close`] directly to
/// observe the outcome instead of relying on drop.
///
/// # Example
///
/// ```no_run
/// use legato::{Client, ClientConfig, Point};
///
/// fn main() -> legato::Result<()> {
///     let client = Client::new(
///         ClientConfig::new("http://localhost:8086")
///             .with_token("my-token")
///             .with_database("metrics"),
///     )?;
///
///     client.write(&Point::new("cpu").tag("host", "web1").field("usage", 42.5))?;
///     client.close()?;
///     Ok(())
/// }
/// ```
pub struct Client {
    shared: Arc<Shared>,
    config: ClientConfig,
    ticker_stop: Sender<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    /// Validates the configuration and starts the write pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid, the HTTP
    /// client cannot be built, or a worker thread cannot be spawned.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let config = config.validated()?;
        let transport = HttpTransport::new(&config)?;
        let opts = &config.write_options;

        let (dispatch_tx, dispatch_rx) = crossbeam_channel::bounded(opts.max_in_flight.max(1));
        let (ticker_stop, ticker_stop_rx) = crossbeam_channel::bounded(1);

        let shared = Arc::new(Shared {
            buffer: Mutex::new(BatchBuffer::new(opts.max_batch_bytes, opts.flush_interval)),
            dispatch_tx,
            closed: AtomicBool::new(false),
            pending_error: Mutex::new(None),
        });

        let gzip_threshold = opts.gzip_threshold;
        let dispatcher = spawn_worker("legato-dispatch", {
            let shared = Arc::clone(&shared);
            move || run_dispatcher(&shared, transport, gzip_threshold, &dispatch_rx)
        })?;

        let mut workers = vec![dispatcher];

        // A zero interval disables time-based flushing; size, flush, and
        // close triggers still apply.
        if !opts.flush_interval.is_zero() {
            let ticker = spawn_worker("legato-ticker", {
                let shared = Arc::clone(&shared);
                let interval = opts.flush_interval;
                move || run_ticker(&shared, interval, &ticker_stop_rx)
            });
            match ticker {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // The dispatcher holds a clone of the shared state, so
                    // it must be told to exit explicitly.
                    let _ = shared.dispatch_tx.send(Dispatch::Shutdown);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(Self {
            shared,
            config,
            ticker_stop,
            workers: Mutex::new(workers),
        })
    }

    /// The validated configuration this client runs with, host normalized.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Encodes one point and appends it to the current batch.
    ///
    /// Returns as soon as the point is buffered; delivery happens in the
    /// background. When this call itself hands off a batch (the size
    /// trigger fired, or the bounded dispatch queue applied backpressure),
    /// it also surfaces any delivery failure recorded since the last
    /// synchronous call.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the point is invalid (the batch is
    /// unaffected), [`WriteError::ClientClosed`] after [`Client::close`],
    /// or a recorded background delivery failure as described above.
    pub fn write(&self, point: &Point) -> Result<()> {
        let mut line = String::new();
        protocol::encode_into(point, &self.config.write_options.default_tags, &mut line)?;
        self.submit(line)
    }

    /// Encodes and buffers a slice of points.
    ///
    /// An encoding failure is local to the offending point: that point is
    /// skipped, its valid siblings are still buffered, and the first such
    /// error is returned once the whole slice has been processed. Delivery
    /// and lifecycle errors abort the remaining slice immediately.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Client::write`].
    pub fn write_points(&self, points: &[Point]) -> Result<()> {
        let defaults = &self.config.write_options.default_tags;
        let mut first_error = None;
        for point in points {
            let mut line = String::new();
            match protocol::encode_into(point, defaults, &mut line) {
                Ok(()) => self.submit(line)?,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Buffers one pre-encoded line protocol record verbatim.
    ///
    /// The record is not validated or escaped; the caller is responsible
    /// for producing well-formed line protocol. Default tags are not
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::EmptyRecord`] for an empty record, and
    /// otherwise the same conditions as [`Client::write`].
    pub fn write_record(&self, record: impl Into<String>) -> Result<()> {
        let record = record.into();
        if record.is_empty() {
            return Err(EncodingError::EmptyRecord.into());
        }
        self.submit(record)
    }

    /// Hands off buffered data and blocks until every batch submitted so
    /// far has reached a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::ClientClosed`] after [`Client::close`], or
    /// the first delivery failure recorded since the last synchronous
    /// call.
    pub fn flush(&self) -> Result<()> {
        let ack_rx = {
            let mut buffer = lock_unpoisoned(&self.shared.buffer);
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(WriteError::ClientClosed.into());
            }
            if let Some(batch) = buffer.take_batch() {
                let _ = self.shared.dispatch_tx.send(Dispatch::Batch(batch));
            }
            let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
            let _ = self.shared.dispatch_tx.send(Dispatch::Barrier(ack_tx));
            ack_rx
        };
        let _ = ack_rx.recv();

        match self.shared.take_pending_error() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Closes the client: hands off any buffered data, waits for the
    /// workers to finish, and releases the HTTP transport.
    ///
    /// Idempotent. A later `close` returns `Ok` without blocking or
    /// re-triggering delivery; writes and flushes after close fail with
    /// [`WriteError::ClientClosed`].
    ///
    /// # Errors
    ///
    /// Returns the first delivery failure recorded since the last
    /// synchronous call, including failures of the final batch.
    pub fn close(&self) -> Result<()> {
        let first = {
            let mut buffer = lock_unpoisoned(&self.shared.buffer);
            if self.shared.closed.swap(true, Ordering::SeqCst) {
                false
            } else {
                if let Some(batch) = buffer.take_batch() {
                    let _ = self.shared.dispatch_tx.send(Dispatch::Batch(batch));
                }
                let _ = self.shared.dispatch_tx.send(Dispatch::Shutdown);
                true
            }
        };

        if first {
            let _ = self.ticker_stop.send(());
            let mut workers = lock_unpoisoned(&self.workers);
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    tracing::error!("write worker panicked");
                }
            }
        }

        match self.shared.take_pending_error() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Appends one encoded record under the buffer lock and hands the
    /// batch off if the size trigger fired.
    fn submit(&self, line: String) -> Result<()> {
        let handed_off = {
            let mut buffer = lock_unpoisoned(&self.shared.buffer);
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(WriteError::ClientClosed.into());
            }
            if buffer.append(line) {
                match buffer.take_batch() {
                    Some(batch) => {
                        let _ = self.shared.dispatch_tx.send(Dispatch::Batch(batch));
                        true
                    }
                    None => false,
                }
            } else {
                false
            }
        };

        if handed_off && let Some(e) = self.shared.take_pending_error() {
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("error while closing write client: {e}");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Locks a mutex, recovering the guard if a worker panicked while holding
/// it. The protected state is kept consistent across every unwind point.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_worker<F>(name: &str, body: F) -> std::result::Result<JoinHandle<()>, ConfigError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| ConfigError::WorkerSpawn {
            name: name.to_string(),
            source: e,
        })
}

/// Ticker loop: checks the interval trigger once per flush interval until
/// told to stop.
fn run_ticker(shared: &Shared, interval: Duration, stop: &Receiver<()>) {
    let ticks = crossbeam_channel::tick(interval);
    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => return,
            recv(ticks) -> _ => shared.flush_if_due(),
        }
    }
}

/// Dispatcher loop: owns the transport and delivers work items in order.
/// Exits on `Shutdown`, dropping the transport and its connections.
fn run_dispatcher(
    shared: &Shared,
    transport: HttpTransport,
    gzip_threshold: usize,
    work: &Receiver<Dispatch>,
) {
    for item in work {
        match item {
            Dispatch::Batch(batch) => {
                let lines = batch.lines.len();
                let bytes = batch.bytes;
                match deliver(&transport, batch, gzip_threshold) {
                    Ok(()) => {
                        tracing::debug!("delivered batch of {lines} line(s), {bytes} bytes");
                    }
                    Err(e) => {
                        tracing::error!("dropped batch of {lines} line(s), {bytes} bytes: {e}");
                        shared.record_error(e);
                    }
                }
            }
            Dispatch::Barrier(ack) => {
                let _ = ack.send(());
            }
            Dispatch::Shutdown => break,
        }
    }
}

fn deliver(
    transport: &HttpTransport,
    batch: Batch,
    gzip_threshold: usize,
) -> std::result::Result<(), WriteError> {
    let lines = batch.lines.len();
    let body = compress::prepare_body(batch.into_payload(), gzip_threshold)?;
    transport.send(&body, lines)
}
