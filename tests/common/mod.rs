#![allow(dead_code)]

use async_trait::async_trait;
use map_harvest::config::toml_config::{ScraperConfig, SelectorConfig, TimingConfig};
use map_harvest::domain::locator::{Locator, ReadMode};
use map_harvest::domain::ports::{DetailPanel, MapPage, PageFactory, ResultsFeed};
use map_harvest::{Result, ScrapeError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn reservation_locator() -> Locator {
    Locator::xpath("//a[contains(@aria-label, 'Reserve a table')]")
}

/// Config with zero settle delays, so scripted pages run instantly.
pub fn test_config(output_dir: &str) -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.timing = TimingConfig::immediate();
    config.discovery.stable_rounds = 1;
    config.output.directory = output_dir.to_string();
    config.selectors.skip_if_present = vec![reservation_locator()];
    config
}

#[derive(Debug, Clone, Default)]
pub struct FakeListing {
    pub url: String,
    elements: HashMap<Locator, (String, HashMap<String, String>)>,
    rows: HashMap<Locator, Vec<String>>,
    fail_open: bool,
}

impl FakeListing {
    pub fn named(name: &str) -> Self {
        let selectors = SelectorConfig::default();
        let mut listing = Self {
            url: format!(
                "https://www.google.com/maps/place/{}/@38.7223,-9.1393,17z/data=!4m6",
                name.replace(' ', "+")
            ),
            ..Self::default()
        };
        listing
            .elements
            .insert(selectors.fields.name.locator, (name.to_string(), HashMap::new()));
        listing
    }

    pub fn attr(mut self, locator: &Locator, attribute: &str, value: &str) -> Self {
        self.elements
            .entry(locator.clone())
            .or_default()
            .1
            .insert(attribute.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, locator: &Locator, value: &str) -> Self {
        self.elements
            .entry(locator.clone())
            .or_default()
            .0 = value.to_string();
        self
    }

    pub fn reviews(self, label: &str) -> Self {
        let selectors = SelectorConfig::default();
        self.attr(&selectors.fields.reviews_count.locator, "aria-label", label)
    }

    pub fn hours(mut self, rows: &[&str]) -> Self {
        let selectors = SelectorConfig::default();
        self.rows.insert(
            selectors.fields.opening_hours.locator,
            rows.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn reservable(self) -> Self {
        self.text(&reservation_locator(), "Reserve a table")
    }

    pub fn without_coordinates(mut self) -> Self {
        self.url = "https://www.google.com/maps/search/somewhere".to_string();
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

/// Map page whose results feed and detail panels follow a script.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    counts: Vec<usize>,
    listings: Vec<FakeListing>,
    failing_searches: HashSet<String>,
    pulse: usize,
    rendered: usize,
    current: Option<usize>,
    pub searches: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl ScriptedPage {
    pub fn new(counts: &[usize], listings: Vec<FakeListing>) -> Self {
        Self {
            counts: counts.to_vec(),
            listings,
            ..Self::default()
        }
    }

    pub fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_searches.insert(query.to_string());
        self
    }

    fn current_listing(&self) -> Result<&FakeListing> {
        self.current
            .and_then(|i| self.listings.get(i))
            .ok_or_else(|| ScrapeError::navigation("no listing open"))
    }
}

#[async_trait]
impl ResultsFeed for ScriptedPage {
    type Handle = usize;

    async fn focus_results(&mut self) -> Result<()> {
        Ok(())
    }

    async fn scroll_results(&mut self, _delta: i64) -> Result<()> {
        if let Some(&count) = self.counts.get(self.pulse).or(self.counts.last()) {
            self.rendered = count.min(self.listings.len());
        }
        self.pulse += 1;
        Ok(())
    }

    async fn count_listings(&mut self) -> Result<usize> {
        Ok(self.rendered)
    }

    async fn listing_handles(&mut self) -> Result<Vec<usize>> {
        Ok((0..self.rendered).collect())
    }

    fn listing_key(&self, handle: &usize) -> String {
        self.listings
            .get(*handle)
            .map(|l| l.url.clone())
            .unwrap_or_else(|| handle.to_string())
    }
}

#[async_trait]
impl DetailPanel<usize> for ScriptedPage {
    async fn open_listing(&mut self, handle: &usize) -> Result<()> {
        let listing = self
            .listings
            .get(*handle)
            .ok_or_else(|| ScrapeError::navigation(format!("listing {} not rendered", handle)))?;
        if listing.fail_open {
            return Err(ScrapeError::navigation("detail panel did not render"));
        }
        self.current = Some(*handle);
        Ok(())
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool> {
        Ok(self.current_listing()?.elements.contains_key(locator))
    }

    async fn read(&mut self, locator: &Locator, mode: &ReadMode) -> Result<Option<String>> {
        let listing = self.current_listing()?;
        Ok(listing.elements.get(locator).and_then(|(text, attrs)| match mode {
            ReadMode::Text => Some(text.clone()),
            ReadMode::Attribute(name) => attrs.get(name).cloned(),
        }))
    }

    async fn read_rows(&mut self, locator: &Locator, limit: usize) -> Result<Vec<String>> {
        let listing = self.current_listing()?;
        Ok(listing
            .rows
            .get(locator)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.current_listing()?.url.clone())
    }
}

#[async_trait]
impl MapPage for ScriptedPage {
    async fn navigate(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<()> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.failing_searches.contains(query) {
            return Err(ScrapeError::navigation("search box not found"));
        }
        self.pulse = 0;
        self.rendered = 0;
        self.current = None;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Hands out a fresh scripted page per job.
pub struct ScriptedFactory {
    pub counts: Vec<usize>,
    pub listings: Vec<FakeListing>,
    pub fail_launch: bool,
}

#[async_trait]
impl PageFactory for ScriptedFactory {
    type Page = ScriptedPage;

    async fn launch(&self) -> Result<ScriptedPage> {
        if self.fail_launch {
            return Err(ScrapeError::setup("webdriver unreachable"));
        }
        Ok(ScriptedPage::new(&self.counts, self.listings.clone()))
    }
}

pub fn listings(names: &[&str]) -> Vec<FakeListing> {
    names.iter().map(|n| FakeListing::named(n)).collect()
}
