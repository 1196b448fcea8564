use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Parse error for '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Extraction failed for field '{field}': {message}")]
    Extraction { field: String, message: String },

    #[error("Navigation failed: {message}")]
    Navigation { message: String },

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("Browser session could not be started: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("Browser setup failed: {message}")]
    Setup { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Spreadsheet export failed: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("A scrape job is already running")]
    JobBusy,

    #[error("Scrape was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    Browser,
    Storage,
    Configuration,
    Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Recovered locally; the affected field falls back to its default.
    Low,
    /// The affected listing or query is dropped, the run goes on.
    Medium,
    High,
    /// No usable browser session or output location.
    Critical,
}

impl ScrapeError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::Navigation {
            message: message.into(),
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } | Self::Extraction { .. } => ErrorCategory::Data,
            Self::Navigation { .. }
            | Self::WebDriver(_)
            | Self::Session(_)
            | Self::Setup { .. } => ErrorCategory::Browser,
            Self::CsvError(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::ZipError(_)
            | Self::XlsxError(_) => ErrorCategory::Storage,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::JobBusy | Self::Cancelled => ErrorCategory::Job,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Parse { .. } => ErrorSeverity::Low,
            Self::Extraction { .. }
            | Self::Navigation { .. }
            | Self::WebDriver(_)
            | Self::JobBusy
            | Self::Cancelled => ErrorSeverity::Medium,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ZipError(_)
            | Self::XlsxError(_)
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorSeverity::High,
            Self::Session(_) | Self::Setup { .. } | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the run as a whole can continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Critical)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Parse { .. } | Self::Extraction { .. } => {
                "The page markup may have changed; review the [selectors] section of the config"
            }
            Self::Navigation { .. } | Self::WebDriver(_) => {
                "Increase the settle delays in the [timing] section or retry later"
            }
            Self::Session(_) | Self::Setup { .. } => {
                "Make sure chromedriver or geckodriver is running and reachable at the configured webdriver URL"
            }
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::ZipError(_)
            | Self::XlsxError(_) => {
                "Check that the output formats are supported and the records are well formed"
            }
            Self::IoError(_) => "Check that the output directory is writable",
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Pass a query with --search or list queries in the input file, and check the config values"
            }
            Self::JobBusy => "Wait for the running job to finish or cancel it first",
            Self::Cancelled => "Submit the queries again to resume",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Setup { .. } => {
                format!("Could not start the browser: {}", self)
            }
            Self::MissingConfigError { field } => {
                format!("Nothing to do: no {} was provided", field)
            }
            Self::IoError(e) => format!("Could not write output: {}", e),
            other => other.to_string(),
        }
    }
}
