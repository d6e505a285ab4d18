mod config;
mod helpers;
mod lifecycle;
mod native;
mod service;
