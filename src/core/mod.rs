pub mod etl;
pub mod transform;

pub use crate::domain::model::{StatRow, StatTable, ZipCode};
pub use crate::domain::ports::Pipeline;
pub use crate::utils::error::Result;
pub use etl::EtlEngine;
