//! Minimal HTTP/1.1 backend for integration tests
//!
//! Serves one canned reply per connection, chosen by a handler closure, and
//! records every request it sees.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path plus query, exactly as sent
    pub target: String,
    pub body: String,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }
}

/// What to send back
#[derive(Debug, Clone)]
pub enum Reply {
    /// A complete JSON body with Content-Length
    Json { status: u16, body: String },
    /// Headers promising more body than is sent before the connection closes
    Truncated { status: u16, partial: String },
    /// A chunked body, one HTTP chunk per element, with a pause between them
    Chunked {
        chunks: Vec<String>,
        delay: Duration,
        /// Send the terminating zero chunk; otherwise drop the connection
        complete: bool,
    },
}

impl Reply {
    /// Envelope reply in the backend's shape
    pub fn envelope(status: u16, is_success: bool, message: &str, data: serde_json::Value) -> Self {
        let body = serde_json::json!({
            "isSuccess": is_success,
            "statusCode": status,
            "message": message,
            "data": data,
        });
        Reply::Json {
            status,
            body: body.to_string(),
        }
    }

    pub fn ok(data: serde_json::Value) -> Self {
        Self::envelope(200, true, "OK", data)
    }

    pub fn stream(chunks: &[&str]) -> Self {
        Reply::Chunked {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay: Duration::from_millis(50),
            complete: true,
        }
    }

    pub fn broken_stream(chunks: &[&str]) -> Self {
        Reply::Chunked {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay: Duration::from_millis(50),
            complete: false,
        }
    }
}

type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

pub struct TestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, handler, recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Address nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

async fn serve(mut socket: TcpStream, handler: Arc<Handler>, recorded: Arc<Mutex<Vec<Recorded>>>) -> std::io::Result<()> {
    let request = read_request(&mut socket).await?;
    recorded.lock().unwrap().push(request.clone());

    match handler(&request) {
        Reply::Json { status, body } => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                body.len()
            );
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(body.as_bytes()).await?;
            socket.flush().await?;
        }
        Reply::Truncated { status, partial } => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                partial.len() + 100
            );
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(partial.as_bytes()).await?;
            socket.flush().await?;
        }
        Reply::Chunked {
            chunks,
            delay,
            complete,
        } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            socket.write_all(head.as_bytes()).await?;
            socket.flush().await?;
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                socket.write_all(frame.as_bytes()).await?;
                socket.flush().await?;
            }
            tokio::time::sleep(delay).await;
            if complete {
                socket.write_all(b"0\r\n\r\n").await?;
                socket.flush().await?;
            }
        }
    }

    socket.shutdown().await
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    let body_end = (header_end + content_length).min(buf.len());
    Ok(Recorded {
        method,
        target,
        body: String::from_utf8_lossy(&buf[header_end..body_end]).to_string(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
