use crate::domain::locator::{Locator, ReadMode};
use crate::utils::error::{Result, ScrapeError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const SUPPORTED_FORMATS: [&str; 4] = ["csv", "tsv", "xlsx", "json"];
pub const SUPPORTED_BROWSERS: [&str; 2] = ["chrome", "firefox"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub browser: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub start_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser: "chrome".to_string(),
            headless: true,
            window_width: 1366,
            window_height: 900,
            start_url: "https://www.google.com/maps".to_string(),
        }
    }
}

/// Fixed settle delays, in milliseconds. The map UI gives no completion
/// signal, so each UI-mutating action is followed by one of these waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub navigation_timeout_ms: u64,
    pub initial_settle_ms: u64,
    pub search_fill_settle_ms: u64,
    pub search_submit_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub panel_settle_ms: u64,
    pub inter_query_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            initial_settle_ms: 5_000,
            search_fill_settle_ms: 3_000,
            search_submit_settle_ms: 5_000,
            scroll_settle_ms: 3_000,
            panel_settle_ms: 15_000,
            inter_query_delay_ms: 30_000,
        }
    }
}

impl TimingConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn panel_settle(&self) -> Duration {
        Duration::from_millis(self.panel_settle_ms)
    }

    pub fn inter_query_delay(&self) -> Duration {
        Duration::from_millis(self.inter_query_delay_ms)
    }

    /// Zero delays everywhere; for scripted pages in tests.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout_ms: 1_000,
            initial_settle_ms: 0,
            search_fill_settle_ms: 0,
            search_submit_settle_ms: 0,
            scroll_settle_ms: 0,
            panel_settle_ms: 0,
            inter_query_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub scroll_delta: i64,
    /// Consecutive pulses without growth before the feed counts as exhausted.
    pub stable_rounds: u32,
    /// Multiplier applied to the settle delay after each pulse without growth.
    pub stall_backoff: f64,
    pub max_settle_ms: u64,
    pub max_pulses: Option<u32>,
    pub max_results: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scroll_delta: 10_000,
            stable_rounds: 2,
            stall_backoff: 1.5,
            max_settle_ms: 12_000,
            max_pulses: None,
            max_results: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Abort the whole listing when a numeric field fails to coerce,
    /// instead of falling back to the field's default.
    pub strict_coercion: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strict_coercion: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelector {
    #[serde(flatten)]
    pub locator: Locator,
    #[serde(default)]
    pub read: ReadMode,
}

impl FieldSelector {
    fn text(xpath: &str) -> Self {
        Self {
            locator: Locator::xpath(xpath),
            read: ReadMode::Text,
        }
    }

    fn attribute(xpath: &str, attribute: &str) -> Self {
        Self {
            locator: Locator::xpath(xpath),
            read: ReadMode::Attribute(attribute.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSelectors {
    pub name: FieldSelector,
    pub address: FieldSelector,
    pub website: FieldSelector,
    pub phone_number: FieldSelector,
    pub category: FieldSelector,
    pub reviews_count: FieldSelector,
    pub reviews_average: FieldSelector,
    pub opening_hours: FieldSelector,
    pub price_level: FieldSelector,
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            name: FieldSelector::text(r#"//h1[@class="DUwDvf lfPIob"]"#),
            address: FieldSelector::text(
                r#"//button[@data-item-id="address"]//div[contains(@class, "fontBodyMedium")]"#,
            ),
            website: FieldSelector::attribute(r#"//a[contains(@aria-label, 'Website')]"#, "href"),
            phone_number: FieldSelector::text(
                r#"//button[contains(@data-item-id, "phone:tel:")]//div[contains(@class, "fontBodyMedium")]"#,
            ),
            category: FieldSelector::text(
                r#"//div[contains(@class, "fontBodyMedium")]//button[contains(@class, "DkEaL")]"#,
            ),
            reviews_count: FieldSelector::attribute("//div[2]/span[2]/span/span", "aria-label"),
            reviews_average: FieldSelector::attribute(
                r#"//div[@jsaction="pane.reviewChart.moreReviews"]//div[@role="img"]"#,
                "aria-label",
            ),
            opening_hours: FieldSelector::text(r#"//table[contains(@class, "eK4R0e")]//tr"#),
            price_level: FieldSelector::text(r#"//span[starts-with(@aria-label, "Price")]"#),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub search_box: Locator,
    pub listing: Locator,
    pub results_feed: Locator,
    /// A listing whose panel shows any of these is skipped without a record.
    pub skip_if_present: Vec<Locator>,
    pub fields: FieldSelectors,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            search_box: Locator::xpath(r#"//input[@id="searchboxinput"]"#),
            listing: Locator::xpath(r#"//a[contains(@href, "https://www.google.com/maps/place")]"#),
            results_feed: Locator::css(r#"div[role="feed"]"#),
            skip_if_present: Vec::new(),
            fields: FieldSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub formats: Vec<String>,
    pub bundle_zip: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            formats: vec!["csv".to_string(), "xlsx".to_string()],
            bundle_zip: false,
        }
    }
}

impl ScraperConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScrapeError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScrapeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScrapeError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("browser.webdriver_url", &self.browser.webdriver_url)?;
        validation::validate_url("browser.start_url", &self.browser.start_url)?;
        validation::validate_one_of("browser.browser", &self.browser.browser, &SUPPORTED_BROWSERS)?;

        validation::validate_positive_number(
            "timing.navigation_timeout_ms",
            self.timing.navigation_timeout_ms,
            1,
        )?;

        if self.discovery.scroll_delta == 0 {
            return Err(ScrapeError::InvalidConfigValueError {
                field: "discovery.scroll_delta".to_string(),
                value: "0".to_string(),
                reason: "Scroll delta cannot be zero".to_string(),
            });
        }
        validation::validate_positive_number(
            "discovery.stable_rounds",
            u64::from(self.discovery.stable_rounds),
            1,
        )?;
        validation::validate_range("discovery.stall_backoff", self.discovery.stall_backoff, 1.0, 10.0)?;
        if let Some(max_pulses) = self.discovery.max_pulses {
            validation::validate_positive_number("discovery.max_pulses", u64::from(max_pulses), 1)?;
        }
        if let Some(max_results) = self.discovery.max_results {
            validation::validate_positive_number("discovery.max_results", max_results as u64, 1)?;
        }

        validation::validate_non_empty_string("selectors.search_box", self.selectors.search_box.as_str())?;
        validation::validate_non_empty_string("selectors.listing", self.selectors.listing.as_str())?;

        validation::validate_path("output.directory", &self.output.directory)?;
        if self.output.formats.is_empty() {
            return Err(ScrapeError::ConfigValidationError {
                field: "output.formats".to_string(),
                message: "At least one output format is required".to_string(),
            });
        }
        for format in &self.output.formats {
            validation::validate_one_of("output.formats", format, &SUPPORTED_FORMATS)?;
        }

        Ok(())
    }
}

impl Validate for ScraperConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
