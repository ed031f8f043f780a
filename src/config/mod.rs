#[cfg(feature = "cli")]
pub mod cli;
pub mod service_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use service_config::{Limits, ServiceConfig, SsrfPolicy, StampBounds};
