// core/src/lib.rs
pub mod config;
pub mod error;
pub mod gpu;
pub mod notify;
pub mod utils;
pub mod watch;
