//! Latitude/longitude from a map-view URL.
//!
//! After a place is opened the map view URL carries the camera position as a
//! path segment such as `/@38.7223,-9.1393,17z/`.

use crate::domain::model::Coordinates;
use crate::utils::error::{Result, ScrapeError};

const MARKER: &str = "/@";

pub fn parse_coordinates(url: &str) -> Result<Coordinates> {
    let start = url
        .rfind(MARKER)
        .ok_or_else(|| ScrapeError::parse(url, "no '@lat,lon' segment in URL"))?
        + MARKER.len();

    let segment = url[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    let mut tokens = segment.split(',');
    let latitude = parse_component(url, tokens.next(), "latitude", 90.0)?;
    let longitude = parse_component(url, tokens.next(), "longitude", 180.0)?;

    Ok(Coordinates {
        latitude,
        longitude,
    })
}

fn parse_component(url: &str, token: Option<&str>, name: &str, bound: f64) -> Result<f64> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScrapeError::parse(url, format!("missing {}", name)))?;

    let value: f64 = token
        .parse()
        .map_err(|_| ScrapeError::parse(url, format!("{} '{}' is not a number", name, token)))?;

    if !value.is_finite() || value.abs() > bound {
        return Err(ScrapeError::parse(
            url,
            format!("{} {} outside ±{}", name, value, bound),
        ));
    }

    Ok(value)
}
