//! Scripted collaborators shared by the crawler unit tests

use crate::crawler::fetcher::{AttemptRequest, RawResponse, Transport, TransportError};
use crate::identity::Identity;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Step {
    Status(u16),
    Timeout,
    /// 200 with a page carrying this many reviews (and a profile)
    Reviews(usize),
}

impl Step {
    fn into_result(self) -> Result<RawResponse, TransportError> {
        match self {
            Step::Status(status) => Ok(RawResponse::new(status, "blocked")),
            Step::Timeout => Err(TransportError::Timeout(Duration::from_secs(30))),
            Step::Reviews(count) => {
                let mut response = RawResponse::new(200, review_page(count));
                response
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
                Ok(response)
            }
        }
    }
}

/// Renders a page with a `__NEXT_DATA__` island
pub fn review_page(count: usize) -> String {
    let reviews: Vec<_> = (0..count).map(|i| json!({"id": format!("r{}", i)})).collect();
    let data = json!({
        "props": {"pageProps": {
            "reviews": reviews,
            "businessUnit": {"id": "bu1", "displayName": "Example"},
            "filters": {"pagination": {"totalPages": 3}}
        }}
    });
    format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        data
    )
}

/// An attempt as observed by the transport
#[derive(Debug, Clone)]
pub struct SeenAttempt {
    pub url: String,
    pub identity: Identity,
    pub fresh_connection: bool,
}

/// Replays a fixed script; the last step repeats once the script runs out
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<SeenAttempt>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SeenAttempt> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: AttemptRequest<'_>) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(SeenAttempt {
            url: request.url.to_string(),
            identity: request.identity.clone(),
            fresh_connection: request.fresh_connection,
        });

        let step = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };

        step.unwrap_or(Step::Status(500)).into_result()
    }
}

/// A proxy answer refusing every CONNECT tunnel
pub const PAYMENT_REQUIRED: &str =
    "HTTP/1.1 402 Payment Required\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// A plain 200 page
pub const PLAIN_OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

/// Serves `reply` to every connection on a local port
///
/// Returns the bound address and a counter of connections accepted. Works as
/// a fake origin or as a fake proxy, since it answers after the request head
/// whatever the method.
pub async fn canned_server(reply: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}
