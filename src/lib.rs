pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServiceConfig;

pub use core::{
    fetcher::ResourceFetcher, patcher::ContainerPatcher, service::DocumentService,
    ssrf::SsrfGuard, stamp::StampPlacer, template::PlaceholderTemplateEngine,
};
pub use utils::error::{DocError, Result};
