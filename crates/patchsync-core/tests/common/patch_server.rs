//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed map of URL paths to canned responses and records every
//! requested path. One request per connection; the server runs until the
//! process exits.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with this body.
    Body(Vec<u8>),
    /// Bare status line with an empty body.
    Status(u16),
    /// Advertises `declared` bytes in Content-Length, sends `body`, then closes.
    Truncated { body: Vec<u8>, declared: usize },
    /// 200, body written in `chunk`-sized pieces with `delay` between them.
    Slow { body: Vec<u8>, chunk: usize, delay: Duration },
}

pub struct PatchServer {
    /// e.g. "http://127.0.0.1:12345/"
    pub base: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl PatchServer {
    /// Every decoded request path, in arrival order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, path: &str) -> usize {
        self.hits().iter().filter(|h| h.as_str() == path).count()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }
}

/// Start serving `routes` (keys are absolute URL paths like "/files/a.pak").
pub fn start(routes: Vec<(&str, Route)>) -> PatchServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Route>> =
        Arc::new(routes.into_iter().map(|(p, r)| (p.to_string(), r)).collect());
    let hits = Arc::new(Mutex::new(Vec::new()));
    let server_hits = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&server_hits);
            thread::spawn(move || handle(stream, &routes, &hits));
        }
    });
    PatchServer {
        base: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>, hits: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = percent_decode(parts.next().unwrap_or("/"));
    hits.lock().unwrap().push(path.clone());

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    match routes.get(&path) {
        None => {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        }
        Some(Route::Status(code)) => {
            let head = format!("HTTP/1.1 {} Canned\r\nContent-Length: 0\r\n\r\n", code);
            let _ = stream.write_all(head.as_bytes());
        }
        Some(Route::Body(body)) => {
            let _ = stream.write_all(ok_head(body.len()).as_bytes());
            let _ = stream.write_all(body);
        }
        Some(Route::Truncated { body, declared }) => {
            let _ = stream.write_all(ok_head(*declared).as_bytes());
            let _ = stream.write_all(body);
        }
        Some(Route::Slow { body, chunk, delay }) => {
            let _ = stream.write_all(ok_head(body.len()).as_bytes());
            for piece in body.chunks((*chunk).max(1)) {
                if stream.write_all(piece).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(*delay);
            }
        }
    }
    let _ = stream.flush();
}

fn ok_head(len: usize) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        len
    )
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
