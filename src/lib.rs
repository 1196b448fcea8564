pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::webdriver::{WebDriverFactory, WebDriverPage};
pub use config::{cli::LocalStorage, toml_config::ScraperConfig};
pub use crate::core::{
    engine::{RunRequest, ScrapeEngine},
    export::TableExporter,
    job::{JobStatus, JobTicket, JobTrigger},
};
pub use domain::model::{Record, RecordBatch, RunSummary};
pub use utils::error::{Result, ScrapeError};
