//! Shared data model for city results.
//!
//! A [`CityRecord`] is built fresh for every query, either from a decoded text
//! search hit or from a geospatial radius candidate. Both sources agree on the
//! point identity through [`GeoHash`], which is what the merge step joins on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The geospatial index's native integer key for a point.
///
/// The same value is written as the text document key at ingestion time, so it
/// doubles as the join key between the two indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoHash(u64);

impl GeoHash {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl From<u64> for GeoHash {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Display for GeoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// One point returned by a geospatial radius query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    pub name: String,
    pub geo_hash: GeoHash,
    /// Distance from the query center in kilometres.
    pub distance_km: f64,
    pub coordinates: Coordinates,
}

/// A city as returned to callers.
///
/// Records are immutable once built. A record decoded from the text index
/// carries a `score` and no coordinates; a record from the geospatial index
/// carries coordinates and a distance but no `score`. Both always carry a
/// [`GeoHash`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRecord {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
    #[serde(flatten)]
    coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_km: Option<f64>,
    geo_hash: GeoHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<i64>,
}

impl CityRecord {
    /// Builds a record from a text search hit.
    ///
    /// `key` is the document key the hit was stored under: the score the
    /// geospatial index assigned the point at ingestion, which is its geohash.
    /// A negative key maps above the 52-bit geohash range and never joins.
    pub fn from_text(name: impl Into<String>, country: Option<String>, key: i64) -> Self {
        Self {
            name: name.into(),
            country,
            coordinates: None,
            distance_km: None,
            geo_hash: GeoHash::new(key as u64),
            score: Some(key),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub const fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub const fn distance_km(&self) -> Option<f64> {
        self.distance_km
    }

    pub const fn geo_hash(&self) -> GeoHash {
        self.geo_hash
    }

    pub const fn score(&self) -> Option<i64> {
        self.score
    }
}

impl From<GeoCandidate> for CityRecord {
    fn from(candidate: GeoCandidate) -> Self {
        Self {
            name: candidate.name,
            country: None,
            coordinates: Some(candidate.coordinates),
            distance_km: Some(candidate.distance_km),
            geo_hash: candidate.geo_hash,
            score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_record_has_score_and_no_coordinates() {
        let record = CityRecord::from_text("Paris", Some("FR".to_string()), 3663832614298053);

        assert_eq!(record.name(), "Paris");
        assert_eq!(record.country(), Some("FR"));
        assert_eq!(record.score(), Some(3663832614298053));
        assert_eq!(record.geo_hash(), GeoHash::new(3663832614298053));
        assert!(record.coordinates().is_none());
        assert!(record.distance_km().is_none());
    }

    #[test]
    fn test_negative_text_key_is_kept_as_score() {
        let record = CityRecord::from_text("Nowhere", None, -4);

        assert_eq!(record.score(), Some(-4));
        assert!(record.geo_hash().bits() >= 1_u64 << (2 * crate::geohash::STEP));
    }

    #[test]
    fn test_geo_record_has_coordinates_and_no_score() {
        let record = CityRecord::from(GeoCandidate {
            name: "Lyon".to_string(),
            geo_hash: GeoHash::new(42),
            distance_km: 3.5,
            coordinates: Coordinates::new(4.8357, 45.764),
        });

        assert_eq!(record.geo_hash(), GeoHash::new(42));
        assert_eq!(record.coordinates(), Some(Coordinates::new(4.8357, 45.764)));
        assert_eq!(record.distance_km(), Some(3.5));
        assert!(record.score().is_none());
        assert!(record.country().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let text = serde_json::to_value(CityRecord::from_text("Lyon", Some("FR".into()), 5))
            .unwrap();
        assert_eq!(
            text,
            serde_json::json!({"name": "Lyon", "country": "FR", "geoHash": 5, "score": 5})
        );

        let geo = serde_json::to_value(CityRecord::from(GeoCandidate {
            name: "Lyon".to_string(),
            geo_hash: GeoHash::new(5),
            distance_km: 1.0,
            coordinates: Coordinates::new(4.5, 45.5),
        }))
        .unwrap();
        assert_eq!(
            geo,
            serde_json::json!({
                "name": "Lyon",
                "longitude": 4.5,
                "latitude": 45.5,
                "distanceKm": 1.0,
                "geoHash": 5
            })
        );
    }
}
