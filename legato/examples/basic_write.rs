//! Minimal write example.
//!
//! Expects an InfluxDB-compatible server on localhost:8086 and reads the
//! API token from `LEGATO_TOKEN`. Run with:
//! `cargo run -p legato --example basic_write`

use legato::{Client, ClientConfig, Point};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client = Client::new(
        ClientConfig::new("http://localhost:8086")
            .with_token(std::env::var("LEGATO_TOKEN").unwrap_or_default())
            .with_database("metrics"),
    )?;

    client.write(
        &Point::new("cpu")
            .tag("host", "web1")
            .field("usage", 42.5),
    )?;

    // close() delivers the buffered point and reports the outcome.
    client.close()?;
    println!("wrote 1 point");
    Ok(())
}
