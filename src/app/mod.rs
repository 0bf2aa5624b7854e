pub mod pipelines;
pub mod plan;

pub use plan::render_plan;
