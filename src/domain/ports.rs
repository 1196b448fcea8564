use crate::domain::locator::{Locator, ReadMode};
use crate::domain::model::RecordBatch;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The scrollable list of search results.
#[async_trait]
pub trait ResultsFeed: Send {
    /// Opaque reference to one rendered, not yet opened listing.
    type Handle: Clone + Debug + Send + Sync;

    /// Moves pointer focus onto the results list so scroll pulses reach it.
    async fn focus_results(&mut self) -> Result<()>;

    async fn scroll_results(&mut self, delta: i64) -> Result<()>;

    async fn count_listings(&mut self) -> Result<usize>;

    /// Currently rendered listings, in render order.
    async fn listing_handles(&mut self) -> Result<Vec<Self::Handle>>;

    /// Identity used to drop listings rendered twice.
    fn listing_key(&self, handle: &Self::Handle) -> String;
}

/// The panel shown after a listing is opened.
#[async_trait]
pub trait DetailPanel<H: Send + Sync>: Send {
    async fn open_listing(&mut self, handle: &H) -> Result<()>;

    async fn is_present(&mut self, locator: &Locator) -> Result<bool>;

    /// `Ok(None)` when the element (or the requested attribute) is absent.
    async fn read(&mut self, locator: &Locator, mode: &ReadMode) -> Result<Option<String>>;

    /// Text of up to `limit` elements matching `locator`, in document order.
    async fn read_rows(&mut self, locator: &Locator, limit: usize) -> Result<Vec<String>>;

    async fn current_url(&mut self) -> Result<String>;
}

/// A full browser page on the map-search UI.
#[async_trait]
pub trait MapPage: ResultsFeed + DetailPanel<<Self as ResultsFeed>::Handle> {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Fills the search box with `query` and submits it.
    async fn search(&mut self, query: &str) -> Result<()>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Opens a fresh browser session for each job.
#[async_trait]
pub trait PageFactory: Send + Sync {
    type Page: MapPage + 'static;

    async fn launch(&self) -> Result<Self::Page>;
}

/// Durable destination for one query's records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Writes `batch` under `stem` and returns the paths written.
    async fn save(&self, batch: &RecordBatch, stem: &str) -> Result<Vec<String>>;
}
