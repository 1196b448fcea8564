use serde::{Deserialize, Serialize};

/// Where to find an element on the page. Selector strings come from
/// configuration since the map UI's markup changes independently of this code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Xpath(String),
    Css(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::Xpath(expr.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Xpath(s) | Self::Css(s) => s,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xpath(s) => write!(f, "xpath:{}", s),
            Self::Css(s) => write!(f, "css:{}", s),
        }
    }
}

/// What to read from a located element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    Text,
    Attribute(String),
}

impl Default for ReadMode {
    fn default() -> Self {
        Self::Text
    }
}
