//! Incremental listing discovery.
//!
//! The results feed lazy-loads on scroll and never says when it is done, so
//! discovery pulses (scroll, settle, recount) until either the requested
//! number of listings is rendered or the count stops growing for
//! `stable_rounds` consecutive pulses.

use crate::config::toml_config::DiscoveryConfig;
use crate::domain::model::Termination;
use crate::domain::ports::ResultsFeed;
use crate::utils::error::{Result, ScrapeError};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub scroll_delta: i64,
    pub settle: Duration,
    pub max_settle: Duration,
    pub stall_backoff: f64,
    pub stable_rounds: u32,
    pub max_pulses: Option<u32>,
    pub target: Option<usize>,
}

impl DiscoverySettings {
    pub fn new(config: &DiscoveryConfig, settle: Duration) -> Self {
        Self {
            scroll_delta: config.scroll_delta,
            settle,
            max_settle: Duration::from_millis(config.max_settle_ms).max(settle),
            stall_backoff: config.stall_backoff,
            stable_rounds: config.stable_rounds.max(1),
            max_pulses: config.max_pulses,
            target: config.max_results,
        }
    }

    pub fn with_target(mut self, target: Option<usize>) -> Self {
        self.target = target;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Discovery<H> {
    pub handles: Vec<H>,
    pub termination: Termination,
    pub pulses: u32,
    /// Listing count on the final pulse, before deduplication and truncation.
    pub rendered: usize,
}

/// Returns `Cancelled` as soon as `cancel` fires, even mid-settle.
pub async fn discover<F>(
    feed: &mut F,
    settings: &DiscoverySettings,
    cancel: &CancellationToken,
) -> Result<Discovery<F::Handle>>
where
    F: ResultsFeed + ?Sized,
{
    feed.focus_results().await?;

    let mut previous_count = 0usize;
    let mut stable_streak = 0u32;
    let mut settle = settings.settle;
    let mut pulses = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        feed.scroll_results(settings.scroll_delta).await?;
        if !settle.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(settle) => {}
            }
        }
        pulses += 1;

        let current_count = feed.count_listings().await?;
        tracing::debug!(pulse = pulses, count = current_count, "results feed pulse");

        let termination = match settings.target {
            Some(target) if current_count >= target => Some(Termination::ReachedTarget),
            _ if current_count == previous_count => {
                stable_streak += 1;
                if stable_streak >= settings.stable_rounds {
                    Some(Termination::Exhausted)
                } else {
                    settle = settle.mul_f64(settings.stall_backoff).min(settings.max_settle);
                    None
                }
            }
            _ => {
                previous_count = current_count;
                stable_streak = 0;
                settle = settings.settle;
                tracing::info!("Currently discovered: {}", current_count);
                None
            }
        };

        let termination = match termination {
            Some(t) => t,
            None if settings.max_pulses.is_some_and(|max| pulses >= max) => {
                tracing::warn!("Stopping discovery after {} pulses without convergence", pulses);
                Termination::PulseLimit
            }
            None => continue,
        };

        let rendered_handles = feed.listing_handles().await?;
        let mut handles = dedupe(&*feed, rendered_handles);
        if let Some(target) = settings.target {
            handles.truncate(target);
        }

        match termination {
            Termination::ReachedTarget => tracing::info!("Reached requested {} listings", handles.len()),
            Termination::Exhausted => tracing::info!("Reached all available listings: {}", handles.len()),
            Termination::PulseLimit => {}
        }

        return Ok(Discovery {
            handles,
            termination,
            pulses,
            rendered: current_count,
        });
    }
}

/// Keeps the first occurrence of each listing key, preserving render order.
fn dedupe<F>(feed: &F, handles: Vec<F::Handle>) -> Vec<F::Handle>
where
    F: ResultsFeed + ?Sized,
{
    let mut seen = HashSet::new();
    handles
        .into_iter()
        .filter(|h| seen.insert(feed.listing_key(h)))
        .collect()
}
