pub mod coordinates;
pub mod discovery;
pub mod engine;
pub mod export;
pub mod fields;
pub mod job;
pub mod processor;

pub use crate::domain::model::{Record, RecordBatch};
pub use crate::domain::ports::{DetailPanel, MapPage, PageFactory, RecordSink, ResultsFeed, Storage};
pub use crate::utils::error::Result;
