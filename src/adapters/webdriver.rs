use crate::config::toml_config::{BrowserConfig, ScraperConfig, SelectorConfig, TimingConfig};
use crate::domain::locator::{Locator, ReadMode};
use crate::domain::ports::{DetailPanel, MapPage, PageFactory, ResultsFeed};
use crate::utils::error::{Result, ScrapeError};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;

/// WebDriver's code point for the Enter key.
const ENTER_KEY: &str = "\u{E007}";

const SCROLL_SCRIPT: &str = r#"
const [kind, expr, delta] = arguments;
const target = kind === "css"
    ? document.querySelector(expr)
    : document.evaluate(expr, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
(target || window).scrollBy(0, delta);
return target !== null;
"#;

const FOCUS_SCRIPT: &str = r#"arguments[0].scrollIntoView({ block: "center" });"#;

fn to_webdriver(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Xpath(expr) => fantoccini::Locator::XPath(expr),
        Locator::Css(selector) => fantoccini::Locator::Css(selector),
    }
}

async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// A rendered result entry.
#[derive(Debug, Clone)]
pub struct WebListing {
    pub index: usize,
    pub href: Option<String>,
    element: Element,
}

/// One browser tab on the map UI, driven over WebDriver.
pub struct WebDriverPage {
    client: Client,
    selectors: SelectorConfig,
    timing: TimingConfig,
}

impl WebDriverPage {
    pub async fn connect(config: &ScraperConfig) -> Result<Self> {
        let browser = &config.browser;
        tracing::info!("Connecting to {} WebDriver at {}", browser.browser, browser.webdriver_url);

        let client = ClientBuilder::native()
            .capabilities(capabilities(browser))
            .connect(&browser.webdriver_url)
            .await?;

        Ok(Self {
            client,
            selectors: config.selectors.clone(),
            timing: config.timing.clone(),
        })
    }

    async fn first(&self, locator: &Locator) -> Result<Option<Element>> {
        let mut found = self.client.find_all(to_webdriver(locator)).await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }
}

fn capabilities(browser: &BrowserConfig) -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();
    let mut args = Vec::new();

    match browser.browser.as_str() {
        "firefox" => {
            if browser.headless {
                args.push("--headless".to_string());
            }
            args.push(format!("--width={}", browser.window_width));
            args.push(format!("--height={}", browser.window_height));
            caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
        }
        _ => {
            args.push("--no-sandbox".to_string());
            if browser.headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
                args.push("--disable-dev-shm-usage".to_string());
            }
            args.push(format!(
                "--window-size={},{}",
                browser.window_width, browser.window_height
            ));
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
    }

    caps
}

#[async_trait]
impl ResultsFeed for WebDriverPage {
    type Handle = WebListing;

    async fn focus_results(&mut self) -> Result<()> {
        match self.first(&self.selectors.listing).await? {
            Some(listing) => {
                self.client
                    .execute(FOCUS_SCRIPT, vec![serde_json::to_value(&listing)?])
                    .await?;
            }
            None => tracing::debug!("No listings rendered to focus"),
        }
        Ok(())
    }

    async fn scroll_results(&mut self, delta: i64) -> Result<()> {
        let (kind, expr) = match &self.selectors.results_feed {
            Locator::Css(s) => ("css", s.as_str()),
            Locator::Xpath(s) => ("xpath", s.as_str()),
        };
        let found = self
            .client
            .execute(SCROLL_SCRIPT, vec![json!(kind), json!(expr), json!(delta)])
            .await?;
        if found == json!(false) {
            tracing::debug!("Results feed not found; scrolled the window instead");
        }
        Ok(())
    }

    async fn count_listings(&mut self) -> Result<usize> {
        Ok(self
            .client
            .find_all(to_webdriver(&self.selectors.listing))
            .await?
            .len())
    }

    async fn listing_handles(&mut self) -> Result<Vec<WebListing>> {
        let elements = self
            .client
            .find_all(to_webdriver(&self.selectors.listing))
            .await?;

        let mut handles = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let href = element.attr("href").await?;
            handles.push(WebListing {
                index,
                href,
                element,
            });
        }
        Ok(handles)
    }

    fn listing_key(&self, handle: &WebListing) -> String {
        handle
            .href
            .clone()
            .unwrap_or_else(|| format!("#{}", handle.index))
    }
}

#[async_trait]
impl DetailPanel<WebListing> for WebDriverPage {
    async fn open_listing(&mut self, handle: &WebListing) -> Result<()> {
        handle.element.click().await.map_err(|e| {
            ScrapeError::navigation(format!("could not open listing {}: {}", handle.index + 1, e))
        })
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool> {
        Ok(!self.client.find_all(to_webdriver(locator)).await?.is_empty())
    }

    async fn read(&mut self, locator: &Locator, mode: &ReadMode) -> Result<Option<String>> {
        let Some(element) = self.first(locator).await? else {
            return Ok(None);
        };
        Ok(match mode {
            ReadMode::Text => Some(element.text().await?),
            ReadMode::Attribute(name) => element.attr(name).await?,
        })
    }

    async fn read_rows(&mut self, locator: &Locator, limit: usize) -> Result<Vec<String>> {
        let elements = self.client.find_all(to_webdriver(locator)).await?;
        let mut rows = Vec::with_capacity(limit.min(elements.len()));
        for element in elements.into_iter().take(limit) {
            rows.push(element.text().await?);
        }
        Ok(rows)
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }
}

#[async_trait]
impl MapPage for WebDriverPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        settle(self.timing.initial_settle_ms).await;
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<()> {
        let search_box = self
            .first(&self.selectors.search_box)
            .await?
            .ok_or_else(|| ScrapeError::navigation("search box not found"))?;

        search_box.clear().await?;
        search_box.send_keys(query).await?;
        settle(self.timing.search_fill_settle_ms).await;

        search_box.send_keys(ENTER_KEY).await?;
        settle(self.timing.search_submit_settle_ms).await;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Opens a new WebDriver session per job.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    config: ScraperConfig,
}

impl WebDriverFactory {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageFactory for WebDriverFactory {
    type Page = WebDriverPage;

    async fn launch(&self) -> Result<WebDriverPage> {
        WebDriverPage::connect(&self.config).await
    }
}
