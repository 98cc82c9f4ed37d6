//! Local HTTP server for driver and conversation tests.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// What the test server saw.
#[derive(Debug)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// A canned response.
pub struct Reply {
    status: u16,
    body: String,
    delay: Duration,
}

impl Reply {
    pub fn sse(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serve `replies` in order on a local port. Returns the base URL and a log
/// of received requests.
pub fn serve(replies: Vec<Reply>) -> (String, mpsc::Receiver<Seen>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for reply in replies {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());
            let _ = tx.send(Seen {
                path: request.url().to_string(),
                authorization,
                body,
            });

            thread::sleep(reply.delay);
            let content_type: &[u8] = if reply.status == 200 {
                b"text/event-stream"
            } else {
                b"application/json"
            };
            let response = tiny_http::Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type).unwrap());
            let _ = request.respond(response);
        }
    });

    (format!("http://{addr}"), rx)
}

/// Wire block for one event.
pub fn block(event: &str, data: &serde_json::Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}
