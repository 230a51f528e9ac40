//! citysuggest - City suggestions from a geospatial and a full-text index
//!
//! Cities are stored twice: once in a geospatial index that answers radius
//! queries, and once in a full-text index that answers name queries. Each text
//! document is keyed by the geohash the geospatial index assigned to its city,
//! which lets a text search be narrowed to the cities near a coordinate.
//!
//! # Quick Start
//!
//! ```rust
//! use citysuggest::index::{GeoIndexWriter, MemoryGeoIndex, TantivySearchIndex, TextIndexWriter};
//! use citysuggest::{CitySuggester, Coordinates, SchemaGeneration, SuggestConfig};
//!
//! let geo = MemoryGeoIndex::new();
//! let text = TantivySearchIndex::in_memory(SchemaGeneration::NameCountry)?;
//! for (name, country, location) in [
//!     ("Paris", "FR", Coordinates::new(2.3522, 48.8566)),
//!     ("Parma", "IT", Coordinates::new(10.3279, 44.8015)),
//! ] {
//!     let key = geo.add(name, location)?;
//!     text.add_document(key.bits(), name, country)?;
//! }
//! text.commit()?;
//!
//! let suggester = CitySuggester::new(geo, text, SuggestConfig::default());
//! let runtime = tokio::runtime::Runtime::new()?;
//!
//! // Text only: both cities, in relevance order
//! let all = runtime.block_on(suggester.cities_by_search("par", None, None))?;
//! assert_eq!(all.len(), 2);
//!
//! // Text narrowed to 100km around Paris
//! let near = runtime.block_on(suggester.cities_by_search("par", Some("2.35"), Some("48.85")))?;
//! assert_eq!(near.len(), 1);
//! assert_eq!(near[0].name(), "Paris");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Errors
//!
//! Every failure is a [`SuggestError`]. [`SuggestError::envelope`] renders it
//! as the `{status, status_text, message}` body reported to callers, with 400
//! for bad input and 500 for everything else.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod city;
pub mod config;
pub mod coordinate;
pub mod decode;
pub mod error;
pub mod geohash;
pub mod index;
mod merge;
mod service;

pub use city::{CityRecord, Coordinates, GeoCandidate, GeoHash};
pub use config::{SuggestConfig, SuggestConfigBuilder};
pub use coordinate::{CoordinateField, ValidationError};
pub use decode::{DecodeError, RawResponse, RawValue, SchemaGeneration, decode_search_response};
pub use error::{ErrorEnvelope, Result, SuggestError};
pub use index::{GeoIndexClient, IndexError, SearchIndexClient};
pub use merge::{DEFAULT_RESULT_CAP, merge};
pub use service::CitySuggester;
pub use tokio_util::sync::CancellationToken;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the citysuggest library.
///
/// Output goes to stderr so it never mixes with results written to stdout.
/// `RUST_LOG` takes precedence over `level` when it is set. Calling this more
/// than once is harmless; only the first call installs a subscriber.
///
/// ```rust
/// use citysuggest::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), citysuggest::SuggestError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static ()> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    })
}
