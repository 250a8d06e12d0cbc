//! CLI for the legato write client.
//!
//! Provides commands for sending individual points and shipping line
//! protocol files to an InfluxDB-compatible server.

use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use legato::{Client, ClientConfig, FieldValue, Point, Precision};

/// legato, a batching line-protocol write client.
#[derive(Parser)]
#[command(name = "legato", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Send a single point built from tags and fields.
    Send {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Measurement name.
        measurement: String,

        /// Tag as key=value. May be repeated.
        #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// Field as key=value. May be repeated. The value is typed the way
        /// line protocol spells it: "42i" (integer), "true"/"false"
        /// (boolean), "42.5" (float), anything else (string).
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field, required = true)]
        fields: Vec<(String, FieldValue)>,

        /// Explicit timestamp in the configured precision. When omitted,
        /// the server assigns its receive time.
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Ship a file of line protocol records as-is.
    Write {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Input file; reads stdin when omitted. Blank lines and lines
        /// starting with '#' are skipped.
        file: Option<PathBuf>,
    },
}

/// Connection settings shared by all commands. Flags override values
/// loaded from `--config`.
#[derive(Args)]
struct ConnectionArgs {
    /// JSON configuration file to start from.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Server base URL, e.g. http://localhost:8086.
    #[arg(long)]
    host: Option<String>,

    /// API token.
    #[arg(long)]
    token: Option<String>,

    /// Organization name or id.
    #[arg(long)]
    org: Option<String>,

    /// Target database.
    #[arg(long)]
    database: Option<String>,

    /// Timestamp precision.
    #[arg(long, value_enum)]
    precision: Option<PrecisionArg>,
}

/// Timestamp precision flag.
#[derive(Clone, Copy, ValueEnum)]
enum PrecisionArg {
    /// Nanoseconds.
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
    /// Seconds.
    S,
}

impl From<PrecisionArg> for Precision {
    fn from(arg: PrecisionArg) -> Self {
        match arg {
            PrecisionArg::Ns => Precision::Nanosecond,
            PrecisionArg::Us => Precision::Microsecond,
            PrecisionArg::Ms => Precision::Millisecond,
            PrecisionArg::S => Precision::Second,
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Send {
            connection,
            measurement,
            tags,
            fields,
            timestamp,
        } => cmd_send(&connection, &measurement, tags, fields, timestamp),
        Commands::Write { connection, file } => cmd_write(&connection, file.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `legato send <measurement> --field k=v ...`.
fn cmd_send(
    connection: &ConnectionArgs,
    measurement: &str,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new(build_config(connection)?)?;

    let mut point = Point::new(measurement);
    for (key, value) in tags {
        point = point.tag(key, value);
    }
    for (key, value) in fields {
        point = point.field(key, value);
    }
    if let Some(ts) = timestamp {
        point = point.timestamp(ts);
    }

    client.write(&point)?;
    client.close()?;

    println!("Sent 1 point to {}", client.config().host);
    Ok(())
}

/// Implements `legato write [file]`.
fn cmd_write(
    connection: &ConnectionArgs,
    file: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let client = Client::new(build_config(connection)?)?;

    let mut sent = 0usize;
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        client.write_record(line)?;
        sent += 1;
    }

    client.close()?;
    println!("Sent {sent} line(s) to {}", client.config().host);
    Ok(())
}

/// Builds the client configuration from `--config` plus flag overrides.
fn build_config(connection: &ConnectionArgs) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &connection.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    if let Some(host) = &connection.host {
        config.host = host.clone();
    }
    if let Some(token) = &connection.token {
        config.token = token.clone();
    }
    if let Some(org) = &connection.org {
        config.organization = org.clone();
    }
    if let Some(database) = &connection.database {
        config.database = database.clone();
    }
    if let Some(precision) = connection.precision {
        config.write_options.precision = Some(precision.into());
    }

    Ok(config)
}

/// Parses a `key=value` tag argument.
fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parses a `key=value` field argument, inferring the value type.
fn parse_field(s: &str) -> Result<(String, FieldValue), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }

    let value = if let Some(int) = raw.strip_suffix('i').and_then(|n| n.parse::<i64>().ok()) {
        FieldValue::Integer(int)
    } else if raw == "true" {
        FieldValue::Boolean(true)
    } else if raw == "false" {
        FieldValue::Boolean(false)
    } else if let Ok(float) = raw.parse::<f64>() {
        FieldValue::Float(float)
    } else {
        FieldValue::String(raw.to_string())
    };

    Ok((key.to_string(), value))
}
