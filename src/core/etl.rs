use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name();
        let started = Instant::now();
        tracing::info!("🚀 Starting stage '{}'", name);

        tracing::debug!("[{}] extracting", name);
        let raw_data = self.pipeline.extract().await?;

        tracing::debug!("[{}] transforming", name);
        let transformed = self.pipeline.transform(raw_data).await?;

        tracing::debug!("[{}] loading", name);
        let output_path = self.pipeline.load(transformed).await?;

        tracing::info!(
            "✅ Stage '{}' finished in {:.1}s -> {}",
            name,
            started.elapsed().as_secs_f64(),
            output_path
        );
        Ok(output_path)
    }
}
