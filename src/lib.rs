pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{AppConfig, ServerConfig};
pub use core::{correlation::CorrelationId, poll::PollPolicy, port_reclaim::PortReclaimer};
pub use utils::error::{DemoError, Result};
