mod lifecycle;
mod native;
mod service;
