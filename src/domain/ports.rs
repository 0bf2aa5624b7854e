use crate::utils::error::Result;
use async_trait::async_trait;

/// One stage of the census ETL run. Each stage pulls its inputs in
/// `extract`, reshapes them in `transform` and persists them in `load`,
/// which returns the path it wrote.
#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    fn name(&self) -> &str;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}
