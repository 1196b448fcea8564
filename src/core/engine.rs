use crate::config::toml_config::ScraperConfig;
use crate::core::discovery::{discover, DiscoverySettings};
use crate::core::export::file_stem;
use crate::core::fields::field_table;
use crate::core::processor::{process_listings, ProcessorSettings};
use crate::domain::model::{QueryReport, RunSummary};
use crate::domain::ports::{MapPage, RecordSink};
use crate::utils::error::{Result, ScrapeError};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Queries to scrape in one run, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub queries: Vec<String>,
    /// Per-query listing cap; falls back to `discovery.max_results`.
    pub max_results: Option<usize>,
}

impl RunRequest {
    pub fn new(queries: Vec<String>) -> Self {
        Self {
            queries,
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Runs search → discovery → extraction → export for each query on one page.
pub struct ScrapeEngine<K: RecordSink> {
    config: ScraperConfig,
    sink: K,
    processor: ProcessorSettings,
    monitor: SystemMonitor,
}

impl<K: RecordSink> ScrapeEngine<K> {
    pub fn new(config: ScraperConfig, sink: K) -> Self {
        let processor = ProcessorSettings {
            panel_settle: config.timing.panel_settle(),
            fields: field_table(&config.selectors.fields),
            skip_if_present: config.selectors.skip_if_present.clone(),
            strict_coercion: config.extraction.strict_coercion,
        };

        Self {
            config,
            sink,
            processor,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(config: ScraperConfig, sink: K, monitor_enabled: bool) -> Self {
        let mut engine = Self::new(config, sink);
        engine.monitor = SystemMonitor::new(monitor_enabled);
        engine
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn run<P: MapPage>(
        &self,
        page: &mut P,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        self.run_with_progress(page, request, cancel, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_query(index, query)` as each query starts.
    pub async fn run_with_progress<P, F>(
        &self,
        page: &mut P,
        request: &RunRequest,
        cancel: &CancellationToken,
        mut on_query: F,
    ) -> Result<RunSummary>
    where
        P: MapPage,
        F: FnMut(usize, &str) + Send,
    {
        let started_at = Utc::now();
        self.open_start_page(page).await?;

        let mut reports = Vec::with_capacity(request.queries.len());
        for (index, query) in request.queries.iter().enumerate() {
            if index > 0 {
                self.pace(cancel).await?;
            }
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            on_query(index, query);
            let report = self.run_query(page, query, request.max_results, cancel).await?;
            self.monitor.log_phase(&format!("query '{}'", query));
            reports.push(report);
        }

        self.monitor.log_final();
        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            queries: reports,
        })
    }

    async fn open_start_page<P: MapPage>(&self, page: &mut P) -> Result<()> {
        let url = &self.config.browser.start_url;
        let timeout = self.config.timing.navigation_timeout();

        match tokio::time::timeout(timeout, page.navigate(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::setup(format!("could not open {}: {}", url, e))),
            Err(_) => Err(ScrapeError::setup(format!(
                "opening {} timed out after {:?}",
                url, timeout
            ))),
        }
    }

    async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        let delay = self.config.timing.inter_query_delay();
        if delay.is_zero() {
            return Ok(());
        }

        tracing::info!("Waiting {:?} before the next query", delay);
        tokio::select! {
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Scrapes one query. Item faults are counted in the report; a failed
    /// search or discovery is recorded as the query's error. Fatal and
    /// cancellation errors propagate.
    async fn run_query<P: MapPage>(
        &self,
        page: &mut P,
        query: &str,
        max_results: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<QueryReport> {
        tracing::info!("Searching for: {}", query);

        let mut report = QueryReport {
            query: query.to_string(),
            discovered: 0,
            records: 0,
            skipped: 0,
            failed: 0,
            termination: None,
            outputs: Vec::new(),
            error: None,
        };

        let target = max_results.or(self.config.discovery.max_results);
        let settings = DiscoverySettings::new(&self.config.discovery, self.config.timing.scroll_settle())
            .with_target(target);

        let discovered = match page.search(query).await {
            Ok(()) => discover(&mut *page, &settings, cancel).await,
            Err(e) => Err(e),
        };

        let discovery = match discovered {
            Ok(discovery) => discovery,
            Err(e) if e.is_fatal() || matches!(e, ScrapeError::Cancelled) => return Err(e),
            Err(e) => {
                tracing::error!("Query '{}' failed before extraction: {}", query, e);
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };
        report.discovered = discovery.handles.len();
        report.termination = Some(discovery.termination);

        let processed = process_listings::<P::Handle, P>(
            page,
            &discovery.handles,
            &self.processor,
            cancel,
        )
        .await?;

        report.records = processed.batch.len();
        report.skipped = processed.skipped;
        report.failed = processed.failed;
        report.outputs = self.sink.save(&processed.batch, &file_stem(query)).await?;

        tracing::info!(
            "Finished scraping {}: {} records, {} skipped, {} failed",
            query,
            report.records,
            report.skipped,
            report.failed
        );
        Ok(report)
    }
}
