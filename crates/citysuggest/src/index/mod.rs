//! Capability interfaces for the geospatial and full-text indexes.
//!
//! The query pipeline never owns an index connection. Callers construct
//! clients and inject them into [`crate::CitySuggester`], so request handling
//! has no hidden global state and every test can drive it with fakes.
//!
//! Two in-process implementations ship with the crate: [`MemoryGeoIndex`] and
//! the Tantivy-backed [`TantivySearchIndex`]. Both also implement the writer
//! traits used by bulk ingestion.

use std::future::Future;

pub use error::IndexError;
pub use fts::TantivySearchIndex;
pub use memory::MemoryGeoIndex;

use crate::city::{Coordinates, GeoCandidate, GeoHash};
use crate::decode::RawResponse;

mod fts;
mod memory;

/// Radius lookups against a geospatial index.
pub trait GeoIndexClient: Send + Sync {
    /// Returns at most `max_results` points within `radius_km` of `center`,
    /// nearest first.
    fn radius_query(
        &self,
        center: Coordinates,
        radius_km: f64,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<GeoCandidate>, IndexError>> + Send;
}

/// Free-text lookups against a full-text index.
///
/// The answer is left in the engine's raw positional form; see
/// [`crate::decode`] for the layout.
pub trait SearchIndexClient: Send + Sync {
    fn text_query(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<RawResponse, IndexError>> + Send;
}

/// Runs synchronous index work on the blocking thread pool.
///
/// The returned future only waits on the pool, so a caller's deadline or
/// cancellation can abandon it while the work is still running.
pub async fn run_blocking<T, F>(work: F) -> Result<T, IndexError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IndexError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Write side of a geospatial index, as used by ingestion.
pub trait GeoIndexWriter {
    /// Adds or replaces the member `name` and returns its assigned score.
    fn add(&self, name: &str, location: Coordinates) -> Result<GeoHash, IndexError>;

    /// Reads back the score assigned to `name`, if it is a member.
    fn score(&self, name: &str) -> Result<Option<GeoHash>, IndexError>;
}

/// Write side of a full-text index, as used by ingestion.
pub trait TextIndexWriter {
    /// Registers a document under `key` with its `name` and `country` fields.
    fn add_document(&self, key: u64, name: &str, country: &str) -> Result<(), IndexError>;

    /// Makes all added documents visible to queries.
    fn commit(&self) -> Result<(), IndexError>;
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("Index unavailable: {0}")]
        Unavailable(String),
        #[error("Query rejected: {0}")]
        QueryRejected(String),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Blocking index task failed: {0}")]
        Join(#[from] tokio::task::JoinError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
}
