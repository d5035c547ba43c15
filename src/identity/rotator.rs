//! Identity selection
//!
//! The rotator owns two read-only pools and a random source. Selection is
//! uniform with replacement; when rotating away from a flagged identity the
//! previous proxy and user agent are skipped as long as the pool offers an
//! alternative.

use crate::config::{IdentityConfig, DEFAULT_USER_AGENTS};
use crate::identity::proxy::{load_proxy_file, ProxyEndpoint};
use crate::ConfigError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// One (proxy, user-agent) pairing used for a network attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    proxy: Option<ProxyEndpoint>,
    user_agent: String,
}

impl Identity {
    pub fn new(proxy: Option<ProxyEndpoint>, user_agent: impl Into<String>) -> Self {
        Self {
            proxy,
            user_agent: user_agent.into(),
        }
    }

    /// The direct-connection sentinel: no proxy, just a user agent
    pub fn direct(user_agent: impl Into<String>) -> Self {
        Self::new(None, user_agent)
    }

    pub fn proxy(&self) -> Option<&ProxyEndpoint> {
        self.proxy.as_ref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn is_direct(&self) -> bool {
        self.proxy.is_none()
    }

    /// Proxy label for logs and the retry ledger
    pub fn proxy_label(&self) -> String {
        match &self.proxy {
            Some(proxy) => proxy.to_string(),
            None => "direct".to_string(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.proxy_label(), self.user_agent)
    }
}

/// Hands out identities from immutable proxy and user-agent pools
pub struct IdentityRotator {
    proxies: Vec<ProxyEndpoint>,
    user_agents: Vec<String>,
    rng: Mutex<StdRng>,
}

impl IdentityRotator {
    /// Creates a rotator seeded from OS entropy
    ///
    /// An empty user-agent pool falls back to the built-in browser list.
    pub fn new(proxies: Vec<ProxyEndpoint>, user_agents: Vec<String>) -> Self {
        Self::with_rng(proxies, user_agents, StdRng::from_entropy())
    }

    /// Creates a rotator with a fixed seed, for reproducible selection
    pub fn with_seed(proxies: Vec<ProxyEndpoint>, user_agents: Vec<String>, seed: u64) -> Self {
        Self::with_rng(proxies, user_agents, StdRng::seed_from_u64(seed))
    }

    fn with_rng(proxies: Vec<ProxyEndpoint>, user_agents: Vec<String>, rng: StdRng) -> Self {
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            user_agents
        };

        Self {
            proxies,
            user_agents,
            rng: Mutex::new(rng),
        }
    }

    /// Builds a rotator from config, merging inline proxies with the proxy file
    ///
    /// # Arguments
    ///
    /// * `config` - The identity section of the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(IdentityRotator)` - Rotator over the configured pools
    /// * `Err(ConfigError)` - The proxy file could not be read
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        let mut proxies: Vec<ProxyEndpoint> = config.proxies.iter().map(ProxyEndpoint::from).collect();

        if let Some(path) = &config.proxy_file {
            proxies.extend(load_proxy_file(path)?);
        }

        if proxies.is_empty() {
            tracing::info!("No proxies configured; attempts will use direct connections");
        }

        Ok(Self::new(proxies, config.user_agents.clone()))
    }

    /// Selects an identity
    ///
    /// With `previous` set (any attempt after a job's first), the proxy and
    /// user agent of `previous` are avoided when the pools allow it. An empty
    /// proxy pool always yields the direct-connection sentinel.
    pub fn next(&self, previous: Option<&Identity>) -> Identity {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let proxy = pick(
            &mut *rng,
            &self.proxies,
            previous.and_then(|identity| identity.proxy.as_ref()),
        )
        .cloned();

        let user_agent = pick(
            &mut *rng,
            &self.user_agents,
            previous.map(|identity| &identity.user_agent),
        )
        .cloned()
        .unwrap_or_default();

        Identity { proxy, user_agent }
    }

    /// Identity for a job's first attempt
    pub fn first(&self) -> Identity {
        self.next(None)
    }

    /// Replacement for an identity the target has flagged
    pub fn rotate(&self, flagged: &Identity) -> Identity {
        self.next(Some(flagged))
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn user_agent_count(&self) -> usize {
        self.user_agents.len()
    }
}

impl fmt::Debug for IdentityRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRotator")
            .field("proxies", &self.proxies.len())
            .field("user_agents", &self.user_agents.len())
            .finish()
    }
}

fn pick<'a, T: PartialEq>(rng: &mut StdRng, pool: &'a [T], avoid: Option<&T>) -> Option<&'a T> {
    if let Some(avoid) = avoid {
        let others: Vec<&T> = pool.iter().filter(|item| *item != avoid).collect();
        if !others.is_empty() {
            return others.choose(rng).copied();
        }
    }
    pool.choose(rng)
}
