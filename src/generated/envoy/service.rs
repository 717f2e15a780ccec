pub mod cluster;
pub mod discovery;
pub mod endpoint;
pub mod listener;
pub mod route;
