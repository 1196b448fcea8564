use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opening hours are read from an unlabeled table, so days are keyed by
/// ordinal (1 = first row) rather than by weekday name.
pub const MAX_OPENING_DAYS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningHours(Vec<String>);

impl OpeningHours {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next day's hours. Returns `false` once all seven days are set.
    pub fn push(&mut self, hours: impl Into<String>) -> bool {
        if self.0.len() >= MAX_OPENING_DAYS {
            return false;
        }
        self.0.push(hours.into());
        true
    }

    pub fn get(&self, day: usize) -> Option<&str> {
        day.checked_sub(1)
            .and_then(|i| self.0.get(i))
            .map(String::as_str)
    }

    /// `(ordinal, hours)` pairs in day order, ordinals starting at 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().enumerate().map(|(i, h)| (i + 1, h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OpeningHours {
    /// Takes at most seven items; the rest are dropped.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .take(MAX_OPENING_DAYS)
                .map(Into::into)
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One listing's attributes. Every field is independently "unknown" when
/// extraction could not read it: empty strings, zero counts, `None` for
/// coordinates and price level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub address: String,
    pub website: String,
    pub phone_number: String,
    pub category: String,
    pub opening_hours: OpeningHours,
    pub reviews_count: u64,
    pub reviews_average: f64,
    pub coordinates: Option<Coordinates>,
    pub price_level: Option<u8>,
}

/// Records for one query, in the order their listings were discovered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordBatch {
    records: Vec<Record>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<Record>> for RecordBatch {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

/// How the discovery loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    ReachedTarget,
    Exhausted,
    PulseLimit,
}

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub query: String,
    pub discovered: usize,
    pub records: usize,
    pub skipped: usize,
    pub failed: usize,
    pub termination: Option<Termination>,
    pub outputs: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub queries: Vec<QueryReport>,
}

impl RunSummary {
    pub fn total_records(&self) -> usize {
        self.queries.iter().map(|q| q.records).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.queries.iter().map(|q| q.failed).sum()
    }
}
