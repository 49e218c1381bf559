//! Switchyard CLI library
//!
//! Argument parsing, configuration loading and the scripted demo that drives
//! the router core through a logging transport.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod transport;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, DemoConfig};
pub use error::{CliError, Result};
pub use transport::TracingTransport;
