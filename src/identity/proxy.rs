//! Proxy endpoints and proxy-file loading

use crate::config::ProxyEntry;
use crate::ConfigError;
use std::fmt;
use std::path::Path;

/// A proxy the transport can route an attempt through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    /// Proxy URL without credentials, e.g. `http://10.0.0.1:8080`
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Creates an endpoint without credentials
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Attaches basic-auth credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Whether the proxy expects basic-auth credentials
    pub fn uses_auth(&self) -> bool {
        self.username.is_some()
    }

    /// Builds the reqwest proxy routing all schemes through this endpoint
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        let proxy = reqwest::Proxy::all(&self.url)?;
        Ok(match &self.username {
            Some(username) => {
                proxy.basic_auth(username, self.password.as_deref().unwrap_or_default())
            }
            None => proxy,
        })
    }
}

impl From<&ProxyEntry> for ProxyEndpoint {
    fn from(entry: &ProxyEntry) -> Self {
        Self {
            url: entry.url.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
        }
    }
}

/// Displays the endpoint with its username, never the password
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{} ({})", self.url, user),
            None => write!(f, "{}", self.url),
        }
    }
}

/// Parses one proxy-file line
///
/// Accepted forms are `host:port` and `host:port:user:pass`. Blank lines and
/// `#` comments yield `None`, as do lines with a bad shape or port.
///
/// # Examples
///
/// ```
/// use sumi_harvest::identity::parse_proxy_line;
///
/// let proxy = parse_proxy_line("10.0.0.1:8080:alice:hunter2").unwrap();
/// assert_eq!(proxy.url, "http://10.0.0.1:8080");
/// assert_eq!(proxy.username.as_deref(), Some("alice"));
/// ```
pub fn parse_proxy_line(line: &str) -> Option<ProxyEndpoint> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split(':').map(str::trim).collect();
    let (host, port, credentials) = match parts.as_slice() {
        [host, port] => (*host, *port, None),
        [host, port, user, pass] => (*host, *port, Some((*user, *pass))),
        _ => return None,
    };

    if host.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;

    let endpoint = ProxyEndpoint::new(format!("http://{}:{}", host, port));
    Some(match credentials {
        Some((user, pass)) if !user.is_empty() || !pass.is_empty() => {
            endpoint.with_credentials(user, pass)
        }
        _ => endpoint,
    })
}

/// Loads proxy endpoints from a file of `host:port[:user:pass]` lines
///
/// Malformed lines are skipped with a warning rather than failing the load.
///
/// # Arguments
///
/// * `path` - Path to the proxy list
///
/// # Returns
///
/// * `Ok(Vec<ProxyEndpoint>)` - Every usable proxy in file order
/// * `Err(ConfigError)` - The file could not be read
pub fn load_proxy_file(path: &Path) -> Result<Vec<ProxyEndpoint>, ConfigError> {
    tracing::info!(file = %path.display(), "Loading proxy list");
    let content = std::fs::read_to_string(path)?;

    let mut proxies = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_proxy_line(line) {
            Some(proxy) => proxies.push(proxy),
            None => tracing::warn!(
                file = %path.display(),
                line = lineno + 1,
                "Skipping proxy entry; expected host:port or host:port:user:pass"
            ),
        }
    }

    tracing::info!(file = %path.display(), proxy_count = proxies.len(), "Loaded proxies");
    Ok(proxies)
}
