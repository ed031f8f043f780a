use crate::domain::model::{DocumentContainer, FetchedResource};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Somewhere a remote image can be downloaded from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<FetchedResource>;
}

/// Fills `{{field}}` placeholders of an already repaired template.
pub trait TemplateEngine: Send + Sync {
    fn render(
        &self,
        template: DocumentContainer,
        data: &serde_json::Value,
    ) -> Result<DocumentContainer>;
}
