//! Batch accumulation and flush triggers.
//!
//! The buffer decouples point ingestion from network dispatch. Encoded
//! records accumulate until one of three triggers fires: the byte size
//! limit, the flush interval, or an explicit flush/close. Whoever fires
//! first takes the whole buffer as a [`Batch`] through a single swap, so a
//! racing second trigger observes an empty buffer and becomes a no-op.

use std::time::{Duration, Instant};

/// A batch of encoded records handed from the buffer to the dispatcher.
///
/// Ephemeral: created by one hand-off, destroyed after a terminal delivery
/// outcome.
#[derive(Debug)]
pub(crate) struct Batch {
    /// Encoded records, in append order.
    pub lines: Vec<String>,
    /// Payload size in bytes, counting one newline separator between records.
    pub bytes: usize,
}

impl Batch {
    /// Joins the records into the HTTP request body.
    pub fn into_payload(self) -> Vec<u8> {
        self.lines.join("\n").into_bytes()
    }
}

/// Accumulates encoded records between hand-offs.
///
/// Not synchronized itself; the client wraps it in a mutex and performs
/// every mutation and hand-off under that single lock.
#[derive(Debug)]
pub(crate) struct BatchBuffer {
    lines: Vec<String>,
    bytes: usize,
    max_batch_bytes: usize,
    flush_interval: Duration,
    last_handoff: Instant,
}

impl BatchBuffer {
    /// Creates an empty buffer with the given size and time triggers.
    pub fn new(max_batch_bytes: usize, flush_interval: Duration) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            max_batch_bytes,
            flush_interval,
            last_handoff: Instant::now(),
        }
    }

    /// Appends one encoded record.
    ///
    /// Returns `true` when the accumulated size reached the batch size limit
    /// and the buffer should be handed off.
    pub fn append(&mut self, line: String) -> bool {
        if !self.lines.is_empty() {
            self.bytes += 1;
        }
        self.bytes += line.len();
        self.lines.push(line);
        self.bytes >= self.max_batch_bytes
    }

    /// True when records are waiting and the flush interval has elapsed
    /// since the last hand-off.
    pub fn interval_due(&self) -> bool {
        !self.lines.is_empty() && self.last_handoff.elapsed() >= self.flush_interval
    }

    /// Takes the accumulated records as a batch, leaving the buffer empty.
    ///
    /// Returns `None` when there is nothing to hand off. A successful
    /// hand-off resets the interval clock.
    pub fn take_batch(&mut self) -> Option<Batch> {
        if self.lines.is_empty() {
            return None;
        }
        self.last_handoff = Instant::now();
        let lines = std::mem::take(&mut self.lines);
        let bytes = std::mem::take(&mut self.bytes);
        tracing::debug!("handing off batch of {} line(s), {bytes} bytes", lines.len());
        Some(Batch { lines, bytes })
    }

    /// Number of buffered records.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_reports_size_trigger() {
        // "aa\nbb\ncc" is 8 bytes; the third append crosses the limit
        let mut buffer = BatchBuffer::new(8, Duration::from_secs(60));
        assert!(!buffer.append("aa".to_string()));
        assert!(!buffer.append("bb".to_string()));
        assert!(buffer.append("cc".to_string()));
    }

    #[test]
    fn test_byte_count_matches_payload() {
        let mut buffer = BatchBuffer::new(1024, Duration::from_secs(60));
        buffer.append("cpu usage=1i".to_string());
        buffer.append("mem free=2i".to_string());

        let batch = buffer.take_batch().unwrap();
        let expected = batch.bytes;
        let payload = batch.into_payload();
        assert_eq!(payload.len(), expected);
        assert_eq!(payload, b"cpu usage=1i\nmem free=2i");
    }

    #[test]
    fn test_take_batch_resets_buffer() {
        let mut buffer = BatchBuffer::new(1024, Duration::from_secs(60));
        buffer.append("a v=1i".to_string());
        buffer.append("b v=2i".to_string());

        let batch = buffer.take_batch().unwrap();
        assert_eq!(batch.lines.len(), 2);

        assert_eq!(buffer.len(), 0);
        assert!(buffer.take_batch().is_none());
    }

    #[test]
    fn test_take_batch_empty_is_noop() {
        let mut buffer = BatchBuffer::new(1024, Duration::from_secs(60));
        assert!(buffer.take_batch().is_none());
    }

    #[test]
    fn test_interval_due_requires_records() {
        let mut buffer = BatchBuffer::new(1024, Duration::ZERO);
        // elapsed >= ZERO always holds, but an empty buffer is never due
        assert!(!buffer.interval_due());
        buffer.append("a v=1i".to_string());
        assert!(buffer.interval_due());
    }

    #[test]
    fn test_handoff_resets_interval_clock() {
        let mut buffer = BatchBuffer::new(1024, Duration::from_secs(60));
        buffer.append("a v=1i".to_string());
        assert!(!buffer.interval_due());

        buffer.take_batch();
        buffer.append("b v=2i".to_string());
        // fresh hand-off, 60s have not elapsed
        assert!(!buffer.interval_due());
    }

    #[test]
    fn test_single_record_batch_has_no_separator() {
        let mut buffer = BatchBuffer::new(1024, Duration::from_secs(60));
        buffer.append("cpu usage=1i".to_string());
        let batch = buffer.take_batch().unwrap();
        assert_eq!(batch.bytes, "cpu usage=1i".len());
    }
}
