//! Longitude/latitude parsing and validation for untyped query input.

use std::fmt;

pub use error::ValidationError;
use tracing::trace;

use crate::city::Coordinates;

pub const MAX_LONGITUDE: f64 = 180.0;
pub const MAX_LATITUDE: f64 = 90.0;
/// Highest latitude the geospatial index's projection can represent.
pub const MAX_PROJECTED_LATITUDE: f64 = 85.05112878;

/// Which half of a coordinate pair a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Longitude,
    Latitude,
}

impl fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Longitude => f.write_str("lng"),
            Self::Latitude => f.write_str("lat"),
        }
    }
}

/// Validates an optional longitude/latitude pair.
///
/// Returns `Ok(None)` when either value is absent or empty, so coordinate
/// filtering stays optional for callers. Present values must parse as real
/// numbers within `[-180, 180]` and `[-90, 90]`. The latitude is then clamped
/// to [`MAX_PROJECTED_LATITUDE`] rather than rejected.
pub fn validate(
    longitude: Option<&str>,
    latitude: Option<&str>,
) -> Result<Option<Coordinates>, ValidationError> {
    let (Some(longitude), Some(latitude)) = (non_empty(longitude), non_empty(latitude)) else {
        return Ok(None);
    };

    let longitude = parse_number(CoordinateField::Longitude, longitude)?;
    if !(-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
        return Err(ValidationError::InvalidLongitude(longitude));
    }

    let latitude = parse_number(CoordinateField::Latitude, latitude)?;
    if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
        return Err(ValidationError::InvalidLatitude(latitude));
    }

    let clamped = latitude.clamp(-MAX_PROJECTED_LATITUDE, MAX_PROJECTED_LATITUDE);
    if clamped != latitude {
        trace!(latitude, clamped, "Latitude clamped to projected range");
    }

    Ok(Some(Coordinates::new(longitude, clamped)))
}

/// Like [`validate`], but a missing value is an error naming the absent field.
pub fn validate_required(
    longitude: Option<&str>,
    latitude: Option<&str>,
) -> Result<Coordinates, ValidationError> {
    if non_empty(longitude).is_none() {
        return Err(ValidationError::MissingCoordinate(CoordinateField::Longitude));
    }
    if non_empty(latitude).is_none() {
        return Err(ValidationError::MissingCoordinate(CoordinateField::Latitude));
    }
    validate(longitude, latitude)?.ok_or(ValidationError::MissingCoordinate(
        CoordinateField::Longitude,
    ))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn parse_number(field: CoordinateField, value: &str) -> Result<f64, ValidationError> {
    value
        .parse::<f64>()
        .map_err(|_| ValidationError::MalformedNumber {
            field,
            value: value.to_string(),
        })
}

mod error {
    use thiserror::Error;

    use super::CoordinateField;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ValidationError {
        #[error("'{0}' is required but missing")]
        MissingCoordinate(CoordinateField),
        #[error("'{field}' is not a number: {value:?}")]
        MalformedNumber {
            field: CoordinateField,
            value: String,
        },
        #[error("'lng' is not in valid range [-180, 180]: {0}")]
        InvalidLongitude(f64),
        #[error("'lat' is not in valid range [-90, 90]: {0}")]
        InvalidLatitude(f64),
        #[error("'q' is a required query parameter")]
        MissingQuery,
    }
}
