//! Field extraction from an opened detail panel.
//!
//! Every attribute is described by a [`FieldSpec`] (where to look, what to
//! read, how to coerce it) and the same locate/read/coerce/default procedure is
//! applied to each entry of the table.

use crate::config::toml_config::{FieldSelector, FieldSelectors};
use crate::domain::locator::{Locator, ReadMode};
use crate::domain::model::{OpeningHours, Record, MAX_OPENING_DAYS};
use crate::domain::ports::DetailPanel;
use crate::utils::error::{Result, ScrapeError};

pub const WEBSITE_NOT_GIVEN: &str = "Not Given";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Address,
    Website,
    PhoneNumber,
    Category,
    ReviewsCount,
    ReviewsAverage,
    OpeningHours,
    PriceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    Integer,
    Decimal,
    Hours,
    PriceLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Decimal(f64),
    Hours(OpeningHours),
    PriceLevel(Option<u8>),
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Address,
        Field::Website,
        Field::PhoneNumber,
        Field::Category,
        Field::ReviewsCount,
        Field::ReviewsAverage,
        Field::OpeningHours,
        Field::PriceLevel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::Website => "website",
            Field::PhoneNumber => "phone_number",
            Field::Category => "category",
            Field::ReviewsCount => "reviews_count",
            Field::ReviewsAverage => "reviews_average",
            Field::OpeningHours => "opening_hours",
            Field::PriceLevel => "price_level",
        }
    }

    pub fn coercion(self) -> Coercion {
        match self {
            Field::ReviewsCount => Coercion::Integer,
            Field::ReviewsAverage => Coercion::Decimal,
            Field::OpeningHours => Coercion::Hours,
            Field::PriceLevel => Coercion::PriceLevel,
            _ => Coercion::Text,
        }
    }

    /// Value recorded when the field's anchor is absent.
    pub fn default_value(self) -> FieldValue {
        match self {
            Field::Website => FieldValue::Text(WEBSITE_NOT_GIVEN.to_string()),
            Field::ReviewsCount => FieldValue::Integer(0),
            Field::ReviewsAverage => FieldValue::Decimal(0.0),
            Field::OpeningHours => FieldValue::Hours(OpeningHours::new()),
            Field::PriceLevel => FieldValue::PriceLevel(None),
            _ => FieldValue::Text(String::new()),
        }
    }

    fn selector(self, selectors: &FieldSelectors) -> &FieldSelector {
        match self {
            Field::Name => &selectors.name,
            Field::Address => &selectors.address,
            Field::Website => &selectors.website,
            Field::PhoneNumber => &selectors.phone_number,
            Field::Category => &selectors.category,
            Field::ReviewsCount => &selectors.reviews_count,
            Field::ReviewsAverage => &selectors.reviews_average,
            Field::OpeningHours => &selectors.opening_hours,
            Field::PriceLevel => &selectors.price_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field: Field,
    pub locator: Locator,
    pub read: ReadMode,
    pub coercion: Coercion,
}

pub fn field_table(selectors: &FieldSelectors) -> Vec<FieldSpec> {
    Field::ALL
        .iter()
        .map(|&field| {
            let selector = field.selector(selectors);
            FieldSpec {
                field,
                locator: selector.locator.clone(),
                read: selector.read.clone(),
                coercion: field.coercion(),
            }
        })
        .collect()
}

impl FieldValue {
    /// Stores the value in the record field it belongs to. Mismatched
    /// variants are ignored; `coerce` never produces them.
    pub fn assign(self, field: Field, record: &mut Record) {
        match (field, self) {
            (Field::Name, FieldValue::Text(v)) => record.name = v,
            (Field::Address, FieldValue::Text(v)) => record.address = v,
            (Field::Website, FieldValue::Text(v)) => record.website = v,
            (Field::PhoneNumber, FieldValue::Text(v)) => record.phone_number = v,
            (Field::Category, FieldValue::Text(v)) => record.category = v,
            (Field::ReviewsCount, FieldValue::Integer(v)) => record.reviews_count = v,
            (Field::ReviewsAverage, FieldValue::Decimal(v)) => record.reviews_average = v,
            (Field::OpeningHours, FieldValue::Hours(v)) => record.opening_hours = v,
            (Field::PriceLevel, FieldValue::PriceLevel(v)) => record.price_level = v,
            (field, value) => {
                tracing::debug!("Ignoring {:?} for field {}", value, field.name());
            }
        }
    }
}

fn leading_token(raw: &str) -> Option<&str> {
    raw.split_whitespace().next()
}

/// `"1,234 reviews"` -> 1234
pub fn coerce_integer(field: &str, raw: &str) -> Result<u64> {
    let token = leading_token(raw)
        .ok_or_else(|| ScrapeError::extraction(field, "empty value"))?
        .replace(',', "");
    token
        .parse()
        .map_err(|_| ScrapeError::extraction(field, format!("'{}' is not an integer", raw.trim())))
}

/// `"4,5 stars"` -> 4.5; ratings outside 0..=5 are rejected.
pub fn coerce_decimal(field: &str, raw: &str) -> Result<f64> {
    let token = leading_token(raw)
        .ok_or_else(|| ScrapeError::extraction(field, "empty value"))?
        .replace(',', ".");
    let value: f64 = token
        .parse()
        .map_err(|_| ScrapeError::extraction(field, format!("'{}' is not a number", raw.trim())))?;

    if !(0.0..=5.0).contains(&value) {
        return Err(ScrapeError::extraction(
            field,
            format!("{} is outside the 0-5 rating scale", value),
        ));
    }
    Ok(value)
}

/// `"$$"` or `"Price: €€€"` -> glyph count; `"2"` -> 2. Must land in 1..=5.
pub fn coerce_price_level(field: &str, raw: &str) -> Result<u8> {
    const GLYPHS: [char; 4] = ['$', '€', '£', '¥'];

    let glyphs = raw.chars().filter(|c| GLYPHS.contains(c)).count();
    let level = if glyphs > 0 {
        glyphs
    } else {
        raw.chars()
            .find(char::is_ascii_digit)
            .and_then(|c| c.to_digit(10))
            .map(|d| d as usize)
            .ok_or_else(|| {
                ScrapeError::extraction(field, format!("'{}' has no price level", raw.trim()))
            })?
    };

    match u8::try_from(level) {
        Ok(level @ 1..=5) => Ok(level),
        _ => Err(ScrapeError::extraction(
            field,
            format!("price level {} is outside 1-5", level),
        )),
    }
}

fn coerce_scalar(spec: &FieldSpec, raw: &str) -> Result<FieldValue> {
    let name = spec.field.name();
    Ok(match spec.coercion {
        Coercion::Text => FieldValue::Text(raw.trim().to_string()),
        Coercion::Integer => FieldValue::Integer(coerce_integer(name, raw)?),
        Coercion::Decimal => FieldValue::Decimal(coerce_decimal(name, raw)?),
        Coercion::PriceLevel => FieldValue::PriceLevel(Some(coerce_price_level(name, raw)?)),
        Coercion::Hours => FieldValue::Hours(std::iter::once(raw.trim()).collect()),
    })
}

/// Reads one field. An absent anchor yields the field's default; a read or
/// coercion failure is returned to the caller.
pub async fn extract_field<H, P>(panel: &mut P, spec: &FieldSpec) -> Result<FieldValue>
where
    H: Send + Sync,
    P: DetailPanel<H> + ?Sized,
{
    if spec.coercion == Coercion::Hours {
        let mut rows = panel.read_rows(&spec.locator, MAX_OPENING_DAYS).await?;
        // Blank trailing days would not survive a flat-table round trip.
        while rows.last().is_some_and(|row| row.trim().is_empty()) {
            rows.pop();
        }
        if rows.is_empty() {
            return Ok(spec.field.default_value());
        }
        let hours: OpeningHours = rows.iter().map(|row| row.trim().to_string()).collect();
        return Ok(FieldValue::Hours(hours));
    }

    match panel.read(&spec.locator, &spec.read).await? {
        Some(raw) => coerce_scalar(spec, &raw),
        None => Ok(spec.field.default_value()),
    }
}

/// Runs every spec against the panel and fills a fresh record.
///
/// With `strict` set, the first failing field aborts the listing; otherwise
/// the field keeps its default and extraction goes on.
pub async fn extract_record<H, P>(panel: &mut P, specs: &[FieldSpec], strict: bool) -> Result<Record>
where
    H: Send + Sync,
    P: DetailPanel<H> + ?Sized,
{
    let mut record = Record::default();

    for spec in specs {
        let value = match extract_field(panel, spec).await {
            Ok(value) => value,
            Err(e @ ScrapeError::Extraction { .. }) if !strict => {
                tracing::warn!("{}; using default", e);
                spec.field.default_value()
            }
            Err(e) => return Err(e),
        };
        value.assign(spec.field, &mut record);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::{parse_delimited, to_delimited};
    use crate::domain::model::RecordBatch;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Panel backed by a map from locator to (text, attributes) and row lists.
    #[derive(Default)]
    struct StaticPanel {
        elements: HashMap<Locator, (String, HashMap<String, String>)>,
        rows: HashMap<Locator, Vec<String>>,
    }

    impl StaticPanel {
        fn text(mut self, locator: &Locator, text: &str) -> Self {
            self.elements
                .insert(locator.clone(), (text.to_string(), HashMap::new()));
            self
        }

        fn attr(mut self, locator: &Locator, name: &str, value: &str) -> Self {
            self.elements
                .entry(locator.clone())
                .or_default()
                .1
                .insert(name.to_string(), value.to_string());
            self
        }

        fn rows(mut self, locator: &Locator, rows: &[&str]) -> Self {
            self.rows
                .insert(locator.clone(), rows.iter().map(|r| r.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl DetailPanel<usize> for StaticPanel {
        async fn open_listing(&mut self, _handle: &usize) -> Result<()> {
            Ok(())
        }

        async fn is_present(&mut self, locator: &Locator) -> Result<bool> {
            Ok(self.elements.contains_key(locator))
        }

        async fn read(&mut self, locator: &Locator, mode: &ReadMode) -> Result<Option<String>> {
            Ok(self.elements.get(locator).and_then(|(text, attrs)| match mode {
                ReadMode::Text => Some(text.clone()),
                ReadMode::Attribute(name) => attrs.get(name).cloned(),
            }))
        }

        async fn read_rows(&mut self, locator: &Locator, limit: usize) -> Result<Vec<String>> {
            Ok(self
                .rows
                .get(locator)
                .map(|rows| rows.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }

        async fn current_url(&mut self) -> Result<String> {
            Ok(String::new())
        }
    }

    fn selectors() -> FieldSelectors {
        FieldSelectors::default()
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer("reviews_count", "1,234 reviews").unwrap(), 1234);
        assert_eq!(coerce_integer("reviews_count", " 87 ").unwrap(), 87);
        assert!(coerce_integer("reviews_count", "no reviews").is_err());
        assert!(coerce_integer("reviews_count", "").is_err());
        assert!(coerce_integer("reviews_count", "-3").is_err());
    }

    #[test]
    fn test_coerce_decimal() {
        assert_eq!(coerce_decimal("reviews_average", "4,5 stars").unwrap(), 4.5);
        assert_eq!(coerce_decimal("reviews_average", "3.9 stars").unwrap(), 3.9);
        assert!(coerce_decimal("reviews_average", "6.0").is_err());
        assert!(coerce_decimal("reviews_average", "stars").is_err());
    }

    #[test]
    fn test_coerce_price_level() {
        assert_eq!(coerce_price_level("price_level", "$$").unwrap(), 2);
        assert_eq!(coerce_price_level("price_level", "Price: €€€").unwrap(), 3);
        assert_eq!(coerce_price_level("price_level", "Level 4").unwrap(), 4);
        assert!(coerce_price_level("price_level", "$$$$$$").is_err());
        assert!(coerce_price_level("price_level", "Moderate").is_err());
    }

    #[test]
    fn test_field_table_covers_every_field() {
        let table = field_table(&selectors());
        assert_eq!(table.len(), Field::ALL.len());
        let website = table.iter().find(|s| s.field == Field::Website).unwrap();
        assert_eq!(website.read, ReadMode::Attribute("href".to_string()));
        assert_eq!(website.coercion, Coercion::Text);
    }

    #[tokio::test]
    async fn test_absent_anchors_yield_declared_defaults() {
        let mut panel = StaticPanel::default();
        let record = extract_record::<usize, _>(&mut panel, &field_table(&selectors()), true)
            .await
            .unwrap();

        assert_eq!(record.name, "");
        assert_eq!(record.address, "");
        assert_eq!(record.website, WEBSITE_NOT_GIVEN);
        assert_eq!(record.phone_number, "");
        assert_eq!(record.category, "");
        assert_eq!(record.reviews_count, 0);
        assert_eq!(record.reviews_average, 0.0);
        assert!(record.opening_hours.is_empty());
        assert_eq!(record.price_level, None);
    }

    #[tokio::test]
    async fn test_blank_trailing_hours_rows_are_dropped() {
        let s = selectors();
        let mut panel = StaticPanel::default()
            .text(&s.name.locator, "Late Bar")
            .rows(&s.opening_hours.locator, &["09:00-17:00", "", "10:00-14:00", " ", ""]);

        let record = extract_record::<usize, _>(&mut panel, &field_table(&s), true)
            .await
            .unwrap();
        let days: Vec<(usize, &str)> = record.opening_hours.iter().collect();
        assert_eq!(days, vec![(1, "09:00-17:00"), (2, ""), (3, "10:00-14:00")]);

        let batch = RecordBatch::from(vec![record]);
        let restored = parse_delimited(&to_delimited(&batch, b',').unwrap(), b',').unwrap();
        assert_eq!(restored, batch.records());
    }

    #[tokio::test]
    async fn test_all_blank_hours_rows_yield_default() {
        let s = selectors();
        let mut panel = StaticPanel::default().rows(&s.opening_hours.locator, &["", "  "]);

        let record = extract_record::<usize, _>(&mut panel, &field_table(&s), true)
            .await
            .unwrap();
        assert!(record.opening_hours.is_empty());
    }

    #[tokio::test]
    async fn test_extracts_all_fields() {
        let s = selectors();
        let mut panel = StaticPanel::default()
            .text(&s.name.locator, " Cafe Luso ")
            .text(&s.address.locator, "Travessa da Queimada 10, Lisboa")
            .attr(&s.website.locator, "href", "https://cafeluso.pt")
            .text(&s.phone_number.locator, "+351 21 342 2281")
            .text(&s.category.locator, "Fado restaurant")
            .attr(&s.reviews_count.locator, "aria-label", "2,311 reviews")
            .attr(&s.reviews_average.locator, "aria-label", "4,3 stars")
            .text(&s.price_level.locator, "€€€")
            .rows(
                &s.opening_hours.locator,
                &["19:30-02:00", "19:30-02:00", "Closed", "19:30-02:00", "19:30-02:00", "19:30-03:00", "19:30-03:00", "extra row"],
            );

        let record = extract_record::<usize, _>(&mut panel, &field_table(&s), true)
            .await
            .unwrap();

        assert_eq!(record.name, "Cafe Luso");
        assert_eq!(record.website, "https://cafeluso.pt");
        assert_eq!(record.reviews_count, 2311);
        assert_eq!(record.reviews_average, 4.3);
        assert_eq!(record.price_level, Some(3));
        assert_eq!(record.opening_hours.len(), 7);
        assert_eq!(record.opening_hours.get(3), Some("Closed"));
        assert_eq!(record.opening_hours.get(7), Some("19:30-03:00"));
    }

    #[tokio::test]
    async fn test_coercion_failure_is_strict_by_default() {
        let s = selectors();
        let mut panel = StaticPanel::default()
            .text(&s.name.locator, "Tasca")
            .attr(&s.reviews_count.locator, "aria-label", "many reviews");

        let err = extract_record::<usize, _>(&mut panel, &field_table(&s), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction { ref field, .. } if field == "reviews_count"));

        let record = extract_record::<usize, _>(&mut panel, &field_table(&s), false)
            .await
            .unwrap();
        assert_eq!(record.name, "Tasca");
        assert_eq!(record.reviews_count, 0);
    }
}
