//! Process-wide outbound proxy routing properties.
//!
//! A small property registry in the style of JVM system properties. HTTP
//! clients inside the process read the proxy endpoint from here, so setting
//! these routes both cleartext and TLS traffic through the local proxy.
//! Other processes get the same routing through [`proxy_env`].

use crate::{PROXY_LOOPBACK_HOST, PROXY_PORT};

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

pub const HTTP_PROXY_HOST: &str = "http.proxyHost";
pub const HTTP_PROXY_PORT: &str = "http.proxyPort";
pub const HTTPS_PROXY_HOST: &str = "https.proxyHost";
pub const HTTPS_PROXY_PORT: &str = "https.proxyPort";

/// Hosts that must never be sent through the proxy, itself included.
pub const NO_PROXY_HOSTS: &str = "127.0.0.1,localhost";

static SYSTEM_PROPERTIES: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());

fn properties() -> MutexGuard<'static, BTreeMap<String, String>> {
    SYSTEM_PROPERTIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) fn poison_for_tests() {
    let _guard = properties();
    panic!("poisoning the property registry");
}

pub fn set_property(key: &str, value: impl Into<String>) {
    properties().insert(key.to_string(), value.into());
}

pub fn get_property(key: &str) -> Option<String> {
    properties().get(key).cloned()
}

pub fn clear_property(key: &str) {
    properties().remove(key);
}

/// Point HTTP and HTTPS routing at the loopback proxy.
pub fn apply_loopback_routing() {
    let port = PROXY_PORT.to_string();

    set_property(HTTP_PROXY_HOST, PROXY_LOOPBACK_HOST);
    set_property(HTTP_PROXY_PORT, port.as_str());
    set_property(HTTPS_PROXY_HOST, PROXY_LOOPBACK_HOST);
    set_property(HTTPS_PROXY_PORT, port);

    debug!("Outbound routing set to {PROXY_LOOPBACK_HOST}:{PROXY_PORT}");
}

/// Proxy URL for cleartext traffic, if routing is configured.
pub fn http_proxy_url() -> Option<String> {
    let host = get_property(HTTP_PROXY_HOST)?;
    let port = get_property(HTTP_PROXY_PORT)?;
    Some(format!("http://{host}:{port}"))
}

/// Proxy URL for TLS traffic, if routing is configured.
pub fn https_proxy_url() -> Option<String> {
    let host = get_property(HTTPS_PROXY_HOST)?;
    let port = get_property(HTTPS_PROXY_PORT)?;
    Some(format!("http://{host}:{port}"))
}

/// Routing as conventional proxy environment variables.
///
/// Empty until routing is applied. Both spellings are included since
/// clients disagree on the case they read.
pub fn proxy_env() -> Vec<(&'static str, String)> {
    let mut env = Vec::new();

    if let Some(url) = http_proxy_url() {
        env.push(("HTTP_PROXY", url.clone()));
        env.push(("http_proxy", url));
    }
    if let Some(url) = https_proxy_url() {
        env.push(("HTTPS_PROXY", url.clone()));
        env.push(("https_proxy", url));
    }
    if !env.is_empty() {
        env.push(("NO_PROXY", NO_PROXY_HOSTS.to_string()));
        env.push(("no_proxy", NO_PROXY_HOSTS.to_string()));
    }

    env
}
