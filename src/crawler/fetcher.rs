//! HTTP transport boundary
//!
//! This module handles every network attempt the engine makes, including:
//! - Building HTTP clients bound to one identity (proxy + user agent)
//! - Honoring the fresh-connection flag on block-tier attempts
//! - Per-attempt request timeouts
//! - Error classification into transient and permanent transport faults

use crate::identity::Identity;
use crate::state::FailureKind;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Clients kept alive for identities still in use; cleared once exceeded
const CLIENT_CACHE_LIMIT: usize = 64;

/// Errors raised below the HTTP layer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection interrupted: {0}")]
    Interrupted(String),

    #[error("Proxy rejected the request: {0}")]
    Proxy(String),

    #[error("Could not build request: {0}")]
    Client(String),
}

impl TransportError {
    /// Maps the error onto the retry taxonomy
    ///
    /// Timeouts, resets and DNS/connect failures are transient. Proxy and
    /// client build failures will not improve by waiting.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) | Self::Connect(_) | Self::Interrupted(_) => {
                FailureKind::TransientNetworkFault
            }
            Self::Proxy(_) | Self::Client(_) => FailureKind::PermanentClientError,
        }
    }

    /// Classifies a reqwest failure
    ///
    /// A proxy that refuses the CONNECT tunnel (payment or authentication
    /// required) surfaces as a connect error, but it is a verdict from the
    /// proxy, not a network fault, so it maps to `Proxy`.
    fn from_reqwest(error: reqwest::Error, timeout: Duration, proxied: bool) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if proxied && is_tunnel_rejection(&error) {
            Self::Proxy(error_chain(&error))
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_builder() {
            Self::Client(error.to_string())
        } else {
            Self::Interrupted(error.to_string())
        }
    }
}

/// Messages reqwest reports when a proxy answers CONNECT with a non-200 status
const TUNNEL_REJECTIONS: &[&str] = &["unsuccessful tunnel", "proxy authentication required"];

fn is_tunnel_rejection(error: &reqwest::Error) -> bool {
    let chain = error_chain(error).to_ascii_lowercase();
    TUNNEL_REJECTIONS.iter().any(|marker| chain.contains(marker))
}

/// Renders an error with every distinct message of its source chain
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// One network attempt as requested by the engine
#[derive(Debug, Clone, Copy)]
pub struct AttemptRequest<'a> {
    pub url: &'a Url,
    pub identity: &'a Identity,
    /// Open a brand-new connection instead of reusing one for this identity
    pub fresh_connection: bool,
    pub timeout: Duration,
}

/// Status, headers and body of a completed exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single request on behalf of the fetch engine
///
/// Implementations never retry; retry policy belongs to the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: AttemptRequest<'_>) -> Result<RawResponse, TransportError>;
}

/// Builds an HTTP client bound to one identity
///
/// The client never keeps idle connections, so a client built for a fresh
/// attempt cannot hand back a socket used by an earlier one.
///
/// # Arguments
///
/// * `identity` - Proxy and user agent every request from this client uses
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (bad proxy URL, TLS setup)
pub fn build_http_client(identity: &Identity) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let mut builder = Client::builder()
        .user_agent(identity.user_agent())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .pool_max_idle_per_host(0)
        .gzip(true)
        .brotli(true);

    // A direct identity must not pick up HTTP_PROXY / HTTPS_PROXY from the environment
    builder = match identity.proxy() {
        Some(proxy) => builder.proxy(proxy.to_reqwest()?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Transport backed by reqwest, one client per identity
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Identity, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, identity: &Identity, fresh: bool) -> Result<Client, TransportError> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if !fresh {
            if let Some(client) = clients.get(identity) {
                return Ok(client.clone());
            }
        }

        let client = build_http_client(identity).map_err(|e| {
            if identity.proxy().is_some() {
                TransportError::Proxy(e.to_string())
            } else {
                TransportError::Client(e.to_string())
            }
        })?;

        if clients.len() >= CLIENT_CACHE_LIMIT {
            clients.clear();
        }
        clients.insert(identity.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: AttemptRequest<'_>) -> Result<RawResponse, TransportError> {
        let client = self.client_for(request.identity, request.fresh_connection)?;
        let proxied = !request.identity.is_direct();

        tracing::trace!(
            url = %request.url,
            identity = %request.identity,
            fresh = request.fresh_connection,
            "Sending request"
        );

        let response = client
            .get(request.url.as_str())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, request.timeout, proxied))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, request.timeout, proxied))?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
