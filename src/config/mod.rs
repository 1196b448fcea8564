pub mod cli;
pub mod toml_config;

use crate::utils::error::{Result, ScrapeError};
#[cfg(feature = "cli")]
use clap::Parser;
use std::path::Path;
#[cfg(feature = "cli")]
use toml_config::ScraperConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "map-harvest")]
#[command(about = "Scrape map-search listings into CSV and Excel tables")]
pub struct CliConfig {
    /// Single search query; takes precedence over the input file
    #[arg(short, long)]
    pub search: Option<String>,

    /// Newline-delimited queries, used when --search is not given
    #[arg(short, long, default_value = "input.txt")]
    pub input: String,

    /// Maximum number of listings to scrape per query
    #[arg(short, long)]
    pub total: Option<usize>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the output directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override the WebDriver endpoint
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per query")]
    pub monitor: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the TOML file when one was given and applies the command-line overrides.
    pub fn load_scraper_config(&self) -> Result<ScraperConfig> {
        let mut config = match &self.config {
            Some(path) => ScraperConfig::from_file(path)?,
            None => ScraperConfig::default(),
        };

        if let Some(total) = self.total {
            config.discovery.max_results = Some(total);
        }
        if let Some(output) = &self.output {
            config.output.directory = output.clone();
        }
        if let Some(webdriver) = &self.webdriver {
            config.browser.webdriver_url = webdriver.clone();
        }
        if self.headful {
            config.browser.headless = false;
        }

        Ok(config)
    }

    pub fn queries(&self) -> Result<Vec<String>> {
        resolve_queries(self.search.as_deref(), Path::new(&self.input))
    }
}

/// A non-blank `search` wins; otherwise the non-blank lines of `input_file`.
pub fn resolve_queries(search: Option<&str>, input_file: &Path) -> Result<Vec<String>> {
    if let Some(query) = search.map(str::trim).filter(|q| !q.is_empty()) {
        return Ok(vec![query.to_string()]);
    }

    let queries: Vec<String> = match std::fs::read_to_string(input_file) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if queries.is_empty() {
        return Err(ScrapeError::MissingConfigError {
            field: format!("search query (--search or {})", input_file.display()),
        });
    }

    Ok(queries)
}
