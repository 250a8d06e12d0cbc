//! Demonstrates the batching triggers against a tiny in-process server.
//!
//! Spins up a local HTTP responder that accepts every write, then submits
//! points in patterns that exercise the size trigger and the interval
//! trigger. Self-contained; no external server needed. Run with:
//! `cargo run -p legato --example batching`

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use legato::{Client, ClientConfig, Point, WriteOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let (url, batches) = start_accepting_server()?;

    let client = Client::new(
        ClientConfig::new(url)
            .with_database("metrics")
            .with_write_options(
                WriteOptions::new()
                    .with_max_batch_bytes(512)
                    .with_flush_interval(Duration::from_millis(500)),
            ),
    )?;

    // Burst: enough data to fire the size trigger several times.
    for i in 0..200 {
        client.write(
            &Point::new("cpu")
                .tag("host", format!("web{}", i % 8))
                .field("usage", f64::from(i) / 2.0),
        )?;
    }
    client.flush()?;
    println!("burst of 200 points arrived in {} batch(es)", batches.load(Ordering::SeqCst));

    // Trickle: a single point is delivered by the interval trigger alone.
    client.write(&Point::new("cpu").tag("host", "web0").field("usage", 1.0))?;
    std::thread::sleep(Duration::from_secs(1));
    println!("trickle delivered, {} batch(es) total", batches.load(Ordering::SeqCst));

    client.close()?;
    Ok(())
}

/// Binds an ephemeral port and answers every request with 204, counting
/// batches as they arrive. The thread dies with the process.
fn start_accepting_server() -> Result<(String, Arc<AtomicUsize>), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}", listener.local_addr()?);
    let batches = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&batches);
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            if handle_write(&stream).is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    Ok((url, batches))
}

fn handle_write(mut stream: &std::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(stream);

    // Drain request line and headers, keeping the body length.
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.trim_end().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse()?;
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    stream.write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")?;
    Ok(())
}
