pub mod config;
pub mod error;
pub mod lifecycle;
pub mod native;
pub mod service;

#[cfg(test)]
mod tests;

pub const OUINET_CLIENT_BINARY: &str = "ouinet-client";
pub const PROXY_LOOPBACK_HOST: &str = "127.0.0.1";
pub const PROXY_PORT: u16 = 8077;
pub const FRONT_END_PORT: u16 = 8078;
pub const PROXY_ENDPOINT: &str = const_format::concatcp!(PROXY_LOOPBACK_HOST, ":", PROXY_PORT);
pub const FRONT_END_ENDPOINT: &str =
    const_format::concatcp!(PROXY_LOOPBACK_HOST, ":", FRONT_END_PORT);
