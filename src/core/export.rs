//! Flat-table export of record batches.
//!
//! Nested opening hours become `opening_hours_1` .. `opening_hours_7`
//! columns, so every format (delimited text and xlsx sheets alike) shares one
//! stable column order regardless of which days a batch happens to contain.

use crate::config::toml_config::OutputConfig;
use crate::domain::model::{Coordinates, OpeningHours, Record, RecordBatch, MAX_OPENING_DAYS};
use crate::domain::ports::{RecordSink, Storage};
use crate::utils::error::{Result, ScrapeError};
use async_trait::async_trait;
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const LEADING_COLUMNS: [&str; 5] = ["name", "address", "website", "phone_number", "category"];
const TRAILING_COLUMNS: [&str; 5] = [
    "reviews_count",
    "reviews_average",
    "latitude",
    "longitude",
    "price_level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            other => Err(ScrapeError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: csv, tsv, xlsx, json".to_string(),
            }),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }

    fn delimiter(self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Xlsx | Self::Json => None,
        }
    }
}

/// Column names of the flattened record, in output order.
pub fn columns() -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((1..=MAX_OPENING_DAYS).map(|day| format!("opening_hours_{}", day)))
        .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

pub fn flatten(record: &Record) -> Vec<String> {
    let mut row = vec![
        record.name.clone(),
        record.address.clone(),
        record.website.clone(),
        record.phone_number.clone(),
        record.category.clone(),
    ];
    row.extend((1..=MAX_OPENING_DAYS).map(|day| {
        record
            .opening_hours
            .get(day)
            .unwrap_or_default()
            .to_string()
    }));
    row.push(record.reviews_count.to_string());
    row.push(record.reviews_average.to_string());
    match record.coordinates {
        Some(c) => {
            row.push(c.latitude.to_string());
            row.push(c.longitude.to_string());
        }
        None => {
            row.push(String::new());
            row.push(String::new());
        }
    }
    row.push(record.price_level.map(|p| p.to_string()).unwrap_or_default());
    row
}

fn cell<'a>(row: &'a csv::StringRecord, index: usize) -> &'a str {
    row.get(index).unwrap_or_default()
}

fn parse_cell<T: std::str::FromStr>(column: &str, value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ScrapeError::parse(value, format!("invalid {} cell", column)))
}

/// Rebuilds a record from a flattened row. Opening hours are read up to the
/// last non-empty day column; blank trailing days are not recoverable.
pub fn unflatten(row: &csv::StringRecord) -> Result<Record> {
    let hours_start = LEADING_COLUMNS.len();
    let hours_end = hours_start + MAX_OPENING_DAYS;

    let day_cells: Vec<&str> = (hours_start..hours_end).map(|i| cell(row, i)).collect();
    let days = day_cells
        .iter()
        .rposition(|h| !h.is_empty())
        .map_or(0, |last| last + 1);
    let opening_hours: OpeningHours = day_cells.into_iter().take(days).collect();

    let latitude = parse_cell::<f64>("latitude", cell(row, hours_end + 2))?;
    let longitude = parse_cell::<f64>("longitude", cell(row, hours_end + 3))?;
    let coordinates = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Ok(Record {
        name: cell(row, 0).to_string(),
        address: cell(row, 1).to_string(),
        website: cell(row, 2).to_string(),
        phone_number: cell(row, 3).to_string(),
        category: cell(row, 4).to_string(),
        opening_hours,
        reviews_count: parse_cell("reviews_count", cell(row, hours_end))?.unwrap_or(0),
        reviews_average: parse_cell("reviews_average", cell(row, hours_end + 1))?.unwrap_or(0.0),
        coordinates,
        price_level: parse_cell("price_level", cell(row, hours_end + 4))?,
    })
}

pub fn to_delimited(batch: &RecordBatch, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(columns())?;
    for record in batch.records() {
        writer.write_record(flatten(record))?;
    }

    writer.into_inner().map_err(|e| ScrapeError::IoError(e.into_error()))
}

pub fn parse_delimited(data: &[u8], delimiter: u8) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(data);

    let expected = columns();
    let headers = reader.headers()?;
    if headers.iter().ne(expected.iter().map(String::as_str)) {
        return Err(ScrapeError::parse(
            headers.iter().collect::<Vec<_>>().join(","),
            "header does not match the record schema",
        ));
    }

    reader
        .records()
        .map(|row| unflatten(&row?))
        .collect()
}

/// One worksheet with a bold header row followed by one row per record.
/// Counts, ratings, coordinates and price levels are written as numbers;
/// empty cells stay blank.
pub fn to_xlsx(batch: &RecordBatch) -> Result<Vec<u8>> {
    let numeric_from = LEADING_COLUMNS.len() + MAX_OPENING_DAYS;
    let header = Format::new().set_bold();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Listings")?;

    for (col, name) in columns().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header)?;
    }

    for (index, record) in batch.records().iter().enumerate() {
        let row = u32::try_from(index + 1).map_err(|_| {
            ScrapeError::parse(index.to_string(), "row index exceeds the sheet limit")
        })?;
        for (col, value) in flatten(record).iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(number) if col >= numeric_from => {
                    sheet.write_number(row, col as u16, number)?;
                }
                _ => {
                    sheet.write_string(row, col as u16, value)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// File stem for a query: whitespace runs and path separators become `_`.
pub fn file_stem(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
}

/// Writes each batch in the configured formats through a [`Storage`].
pub struct TableExporter<S: Storage> {
    storage: S,
    formats: Vec<ExportFormat>,
    bundle_zip: bool,
}

impl<S: Storage> TableExporter<S> {
    pub fn new(storage: S, formats: Vec<ExportFormat>, bundle_zip: bool) -> Self {
        Self {
            storage,
            formats,
            bundle_zip,
        }
    }

    pub fn from_config(storage: S, config: &OutputConfig) -> Result<Self> {
        let formats = config
            .formats
            .iter()
            .map(|f| ExportFormat::parse(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(storage, formats, config.bundle_zip))
    }

    fn render(&self, batch: &RecordBatch, format: ExportFormat) -> Result<Vec<u8>> {
        match (format, format.delimiter()) {
            (_, Some(delimiter)) => to_delimited(batch, delimiter),
            (ExportFormat::Xlsx, None) => to_xlsx(batch),
            (_, None) => Ok(serde_json::to_vec_pretty(batch.records())?),
        }
    }

    fn bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

#[async_trait]
impl<S: Storage> RecordSink for TableExporter<S> {
    async fn save(&self, batch: &RecordBatch, stem: &str) -> Result<Vec<String>> {
        let mut written = Vec::with_capacity(self.formats.len() + 1);
        let mut files = Vec::with_capacity(self.formats.len());

        for &format in &self.formats {
            let name = format!("{}.{}", stem, format.extension());
            let data = self.render(batch, format)?;
            tracing::debug!("Writing {} ({} bytes, {} rows)", name, data.len(), batch.len());
            self.storage.write_file(&name, &data).await?;
            written.push(name.clone());
            files.push((name, data));
        }

        if self.bundle_zip {
            let name = format!("{}.zip", stem);
            let data = Self::bundle(&files)?;
            self.storage.write_file(&name, &data).await?;
            written.push(name);
        }

        Ok(written)
    }
}
