pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::storage::LocalStorage;
pub use core::{etl::EtlEngine, pipeline::IsuPipeline};
pub use utils::error::{EtlError, Result};
