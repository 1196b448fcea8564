use crate::core::coordinates::parse_coordinates;
use crate::core::fields::{extract_record, FieldSpec};
use crate::domain::locator::Locator;
use crate::domain::model::{Record, RecordBatch};
use crate::domain::ports::DetailPanel;
use crate::utils::error::{Result, ScrapeError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub panel_settle: Duration,
    pub fields: Vec<FieldSpec>,
    pub skip_if_present: Vec<Locator>,
    pub strict_coercion: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub batch: RecordBatch,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Sealed(Record),
    Skipped(Locator),
}

/// Opens each handle in order and collects one record per listing.
///
/// A failing listing is logged and counted; it never aborts the batch.
/// Cancellation is honoured between listings.
pub async fn process_listings<H, P>(
    panel: &mut P,
    handles: &[H],
    settings: &ProcessorSettings,
    cancel: &CancellationToken,
) -> Result<ProcessReport>
where
    H: std::fmt::Debug + Send + Sync,
    P: DetailPanel<H> + ?Sized,
{
    let mut report = ProcessReport::default();

    for (index, handle) in handles.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        match process_one(panel, handle, settings).await {
            Ok(Outcome::Sealed(record)) => {
                tracing::debug!("Listing {} scraped: {}", index + 1, record.name);
                report.batch.push(record);
            }
            Ok(Outcome::Skipped(locator)) => {
                tracing::info!("Skipping listing {}: panel shows {}", index + 1, locator);
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!("Listing {} ({:?}) failed: {}", index + 1, handle, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn process_one<H, P>(panel: &mut P, handle: &H, settings: &ProcessorSettings) -> Result<Outcome>
where
    H: Send + Sync,
    P: DetailPanel<H> + ?Sized,
{
    panel.open_listing(handle).await?;
    if !settings.panel_settle.is_zero() {
        tokio::time::sleep(settings.panel_settle).await;
    }

    for locator in &settings.skip_if_present {
        if panel.is_present(locator).await? {
            return Ok(Outcome::Skipped(locator.clone()));
        }
    }

    let mut record =
        extract_record::<H, P>(panel, &settings.fields, settings.strict_coercion).await?;

    let url = panel.current_url().await?;
    match parse_coordinates(&url) {
        Ok(coordinates) => record.coordinates = Some(coordinates),
        Err(e) => tracing::debug!("Coordinates unknown: {}", e),
    }

    Ok(Outcome::Sealed(record))
}
