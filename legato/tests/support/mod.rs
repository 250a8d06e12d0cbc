//! Scripted HTTP server for integration tests.
//!
//! Backed by `std::net::TcpListener`; no HTTP framework needed. The server
//! binds an ephemeral local port, answers each incoming request with the
//! next canned response from its script, and records every request so
//! tests can assert on method, target, headers, and body. Shared between
//! test binaries, so not every binary exercises every helper.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

/// One response the server will send, in script order.
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CannedResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

/// One request the server received.
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string, exactly as sent in the request line.
    pub target: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The body as UTF-8 text.
    pub fn body_text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

/// A local server that plays a fixed script of responses.
pub struct TestServer {
    url: String,
    handle: JoinHandle<Vec<RecordedRequest>>,
}

impl TestServer {
    /// Binds an ephemeral port and starts serving the script.
    pub fn start(script: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || serve(&listener, script));
        Self { url, handle }
    }

    /// Base URL of the server, suitable for `ClientConfig::new`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Blocks until every scripted response has been consumed, then
    /// returns the recorded requests in arrival order.
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().unwrap()
    }
}

fn serve(listener: &TcpListener, script: Vec<CannedResponse>) -> Vec<RecordedRequest> {
    let mut recorded = Vec::new();
    for response in script {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        match handle_connection(&stream, &response) {
            Ok(request) => recorded.push(request),
            Err(e) => panic!("test server request error: {e}"),
        }
    }
    recorded
}

/// Reads one full request off the stream and answers with `response`.
/// Each connection serves exactly one request and is then closed.
fn handle_connection(
    mut stream: &TcpStream,
    response: &CannedResponse,
) -> Result<RecordedRequest, Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(stream);

    // Parse: "POST /path?query HTTP/1.x"
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or("missing method")?.to_string();
    let target = parts.next().ok_or("missing request target")?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or("malformed header")?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if name == "content-length" {
            content_length = value.parse()?;
        }
        headers.push((name, value));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    let status_text = match response.status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Other",
    };
    let mut head = format!("HTTP/1.1 {} {status_text}\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    head.push_str("Connection: close\r\n\r\n");

    stream.write_all(head.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()?;

    Ok(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// Decompresses a gzip body.
pub fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .unwrap();
    out
}
