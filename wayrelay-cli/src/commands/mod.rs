//! CLI command implementations.

pub mod common;
pub mod config;
pub mod devices;
pub mod geocode;
pub mod init;
pub mod navigate;
pub mod route;
