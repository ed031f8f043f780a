pub mod container;
pub mod fetcher;
pub mod normalizer;
pub mod patcher;
pub mod pdf;
pub mod relationships;
pub mod service;
pub mod ssrf;
pub mod stamp;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{DocumentContainer, FetchedResource, HealthReport};
pub use crate::domain::ports::{ImageSource, Storage, TemplateEngine};
pub use crate::utils::error::Result;
