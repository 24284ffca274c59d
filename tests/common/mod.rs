// Hand-rolled mock HTTP server for integration tests. No `wiremock` or
// similar dependency: a bare `tokio::net::TcpListener` accept loop that
// matches `(method, path)` against a small route table and writes back a
// canned status/body. Good enough for the one-request-at-a-time
// login/renew/logout exchanges this subsystem makes against an on-prem
// security service.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub body: String,
}

impl Route {
    pub fn json(status: u16, body: impl Into<String>) -> Route {
        Route { status, body: body.into() }
    }
}

/// Records the `(method, path, authorization-header)` of every request it
/// has served, so a test can assert on what the client actually sent
/// (e.g. that a renew used the previous bearer token, not Basic auth).
pub struct MockServer {
    pub addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<(String, String, Option<String>)>>>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl MockServer {
    /// Start listening on an ephemeral port with a fixed route table keyed
    /// by `"<METHOD> <path>"`. Unmatched requests get a 404.
    pub async fn start(routes: HashMap<String, Route>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown, mut shutdown_rx) = tokio::sync::watch::channel(false);

        let requests_for_task = requests.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => {
                        let Ok((socket, _)) = accepted else { break };
                        let routes = routes.clone();
                        let requests = requests_for_task.clone();
                        tokio::spawn(handle_connection(socket, routes, requests));
                    }
                }
            }
        });

        MockServer { addr, requests, shutdown }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn requests(&self) -> Vec<(String, String, Option<String>)> {
        self.requests.lock().await.clone()
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn handle_connection(
    mut socket: tokio::net::TcpStream,
    routes: HashMap<String, Route>,
    requests: Arc<Mutex<Vec<(String, String, Option<String>)>>>,
) {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            return;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    let mut authorization = None;
    for line in lines {
        if let Some(rest) = line.strip_prefix("authorization:").or_else(|| line.strip_prefix("Authorization:")) {
            authorization = Some(rest.trim().to_string());
        }
    }

    requests.lock().await.push((method.clone(), path.clone(), authorization));

    let key = format!("{} {}", method, path);
    let route = routes.get(&key).cloned().unwrap_or(Route::json(404, "{}"));

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        route.status,
        status_text(route.status),
        route.body.len(),
        route.body,
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    }
}
