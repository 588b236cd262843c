//! Integration-test harness: a real server on an ephemeral port and a raw
//! TCP client.
//!
//! The client speaks bytes rather than going through an HTTP library
//! because the assertions in the test suite are about the exact wire
//! format the server produces, LF-framed head included.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::app::App;
use crate::server::Server;

/// A running server for one test.
pub struct TestServer {
    pub addr: SocketAddr,
    server: Arc<Server>,
}

impl TestServer {
    /// Build the app's server and serve it on `127.0.0.1:0` in a
    /// background task.
    pub async fn start(app: App) -> Self {
        let server = Arc::new(app.build().expect("test app failed to build"));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("no local addr");

        let serving = server.clone();
        tokio::spawn(async move {
            let _ = serving.serve_on(listener).await;
        });

        TestServer { addr, server }
    }

    /// Write raw request bytes, read the connection to EOF, parse.
    pub async fn send_raw(&self, raw: &[u8]) -> TestResponse {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .expect("failed to connect to test server");
        stream.write_all(raw).await.expect("request write failed");

        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .expect("response read failed");
        TestResponse::parse(&buf)
    }

    /// Send a bare GET with CRLF framing.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send_raw(format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
            .await
    }

    /// Send a request with arbitrary method, headers, and body.
    /// `Content-Length` is added automatically.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> TestResponse {
        let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: test\r\n").into_bytes();
        for (name, value) in headers {
            raw.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        raw.extend_from_slice(body);
        self.send_raw(&raw).await
    }

    pub fn close(&self) {
        self.server.close();
    }
}

/// A parsed wire response for assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub protocol: String,
    pub status: u16,
    pub status_message: String,
    /// Lowercased name -> value.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse the LF-framed wire format: status line, header lines, blank
    /// line, body.
    pub fn parse(raw: &[u8]) -> Self {
        let split = raw
            .windows(2)
            .position(|w| w == b"\n\n")
            .expect("response has no head/body separator");
        let head = String::from_utf8_lossy(&raw[..split]);
        let body = raw[split + 2..].to_vec();

        let mut lines = head.lines();
        let status_line = lines.next().expect("empty response head");
        let mut parts = status_line.splitn(3, ' ');
        let protocol = parts.next().unwrap_or_default().to_string();
        let status: u16 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .expect("unparsable status code");
        let status_message = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        TestResponse {
            protocol,
            status,
            status_message,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }
}
