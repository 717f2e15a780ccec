pub mod cluster;
pub mod core;
pub mod endpoint;
pub mod listener;
pub mod route;
