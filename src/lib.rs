//! cumbre library
//!
//! AEMET mountain weather forecasts and avalanche bulletins. The modules are
//! exposed for the binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod loader;
pub mod logging;
pub mod service;
pub mod ui;
