pub mod discovery;
pub mod etl;
pub mod fetcher;
pub mod filter;
pub mod pipeline;
pub mod seasonal_best;
pub mod tfm;
pub mod weather;

pub use crate::domain::model::{FetchReport, LoadSummary, TransformOutput};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
