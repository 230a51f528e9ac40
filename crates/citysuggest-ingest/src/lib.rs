//! Bulk loading of a JSON city list into the geo and text indexes.
//!
//! Each city is first added to the geospatial index. The score that index
//! assigns is read back and used as the key of the city's text document, so
//! the two indexes can later be joined on it.

use std::io::{BufReader, Read};
use std::path::Path;

use citysuggest::Coordinates;
use citysuggest::coordinate::validate_required;
use citysuggest::index::{GeoIndexWriter, TextIndexWriter};
pub use error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

mod error;

/// One entry of the input city list. Coordinates are kept as the strings the
/// file carries until [`CityRaw::to_location`] parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRaw {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "lat")]
    pub latitude: String,
    #[serde(rename = "lng")]
    pub longitude: String,
}

impl CityRaw {
    /// Parses and validates the coordinates the same way queries do,
    /// including the latitude clamp.
    pub fn to_location(&self) -> Result<Coordinates> {
        validate_required(Some(self.longitude.as_str()), Some(self.latitude.as_str())).map_err(
            |source| IngestError::InvalidCoordinates {
                name: self.name.clone(),
                source,
            },
        )
    }
}

/// Outcome counts of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Cities written to both indexes.
    pub ingested: usize,
    /// Cities dropped for unusable coordinates.
    pub skipped: usize,
    /// Cities in the geo index whose text document could not be added.
    pub failed_text: usize,
}

pub fn load_cities(path: impl AsRef<Path>) -> Result<Vec<CityRaw>> {
    let file = std::fs::File::open(path)?;
    load_cities_from_reader(BufReader::new(file))
}

pub fn load_cities_from_reader(reader: impl Read) -> Result<Vec<CityRaw>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `cities` into both indexes and commits the text index.
///
/// A failing geo write or score read aborts the run, since without a score the
/// text document has no key. Text write failures are logged and counted.
#[instrument(name = "Ingest cities", skip_all, fields(cities = cities.len()))]
pub fn ingest<G, T>(cities: &[CityRaw], geo: &G, text: &T) -> Result<IngestReport>
where
    G: GeoIndexWriter + ?Sized,
    T: TextIndexWriter + ?Sized,
{
    let t_ingest = std::time::Instant::now();
    let mut report = IngestReport::default();

    for (position, city) in cities.iter().enumerate() {
        let location = match city.to_location() {
            Ok(location) => location,
            Err(e) => {
                warn!(position, error = %e, "Skipping city");
                report.skipped += 1;
                continue;
            }
        };

        geo.add(&city.name, location)
            .map_err(|source| index_error(city, source))?;
        let score = geo
            .score(&city.name)
            .map_err(|source| index_error(city, source))?
            .ok_or_else(|| IngestError::MissingScore(city.name.clone()))?;

        if let Err(e) = text.add_document(score.bits(), &city.name, &city.country) {
            warn!(position, name = %city.name, error = %e, "Text document not added");
            report.failed_text += 1;
            continue;
        }

        debug!(position, name = %city.name, %score, "Ingested city");
        report.ingested += 1;
    }

    text.commit().map_err(IngestError::Commit)?;
    info!(
        ingested = report.ingested,
        skipped = report.skipped,
        failed_text = report.failed_text,
        ingest_seconds = t_ingest.elapsed().as_secs_f32(),
        "Ingestion complete"
    );
    Ok(report)
}

/// [`load_cities`] followed by [`ingest`].
pub fn ingest_file<G, T>(path: impl AsRef<Path>, geo: &G, text: &T) -> Result<IngestReport>
where
    G: GeoIndexWriter + ?Sized,
    T: TextIndexWriter + ?Sized,
{
    let cities = load_cities(path)?;
    ingest(&cities, geo, text)
}

fn index_error(city: &CityRaw, source: citysuggest::IndexError) -> IngestError {
    IngestError::Index {
        name: city.name.clone(),
        source,
    }
}
