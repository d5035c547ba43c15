//! Page-count discovery
//!
//! Probes page 2 and then page 1 of a target and reads the total page count
//! from the page's data island. Page 2 is tried first because some targets
//! omit pagination data on their landing page.

use crate::crawler::fetcher::{AttemptRequest, Transport, TransportError};
use crate::crawler::parser::total_pages;
use crate::identity::Identity;
use crate::url::prepare_page_url;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a discovery probe could not produce a page count
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Discovery request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Discovery request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Reports how many content pages a target has
#[async_trait]
pub trait PageCountDiscovery: Send + Sync {
    /// Returns `Ok(None)` when the target answered but carried no page count
    async fn discover_total_pages(&self, base_url: &Url) -> Result<Option<u32>, DiscoveryError>;
}

/// Discovery over the page's `__NEXT_DATA__` pagination block
pub struct NextDataDiscovery {
    transport: Arc<dyn Transport>,
    identity: Identity,
    languages: Option<String>,
    timeout: Duration,
}

impl NextDataDiscovery {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Identity,
        languages: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            identity,
            languages: languages.map(str::to_string),
            timeout,
        }
    }

    async fn probe(&self, url: &Url) -> Result<Option<u32>, DiscoveryError> {
        let response = self
            .transport
            .send(AttemptRequest {
                url,
                identity: &self.identity,
                fresh_connection: false,
                timeout: self.timeout,
            })
            .await?;

        if !response.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        Ok(total_pages(&String::from_utf8_lossy(&response.body)))
    }
}

#[async_trait]
impl PageCountDiscovery for NextDataDiscovery {
    async fn discover_total_pages(&self, base_url: &Url) -> Result<Option<u32>, DiscoveryError> {
        tracing::info!(url = %base_url, identity = %self.identity, "Discovering total pages");

        let mut last_error = None;
        let mut answered = false;
        for page in [2, 1] {
            let url = prepare_page_url(base_url, page, self.languages.as_deref());
            match self.probe(&url).await {
                Ok(Some(total)) => {
                    tracing::info!(url = %url, total_pages = total, "Found total pages");
                    return Ok(Some(total));
                }
                Ok(None) => {
                    tracing::debug!(url = %url, "No pagination data on page");
                    answered = true;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Discovery probe failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}
