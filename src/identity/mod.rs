//! Network identity management
//!
//! An [`Identity`] pairs a proxy endpoint (or a direct connection) with a
//! user-agent string. The [`IdentityRotator`] hands out identities drawn from
//! immutable pools injected at construction.

mod proxy;
mod rotator;

pub use proxy::{load_proxy_file, parse_proxy_line, ProxyEndpoint};
pub use rotator::{Identity, IdentityRotator};
