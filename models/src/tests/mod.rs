mod proxy_config;
mod shutdown_request;
