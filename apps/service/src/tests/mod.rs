mod logger;
mod proxy_env;
mod requests;
