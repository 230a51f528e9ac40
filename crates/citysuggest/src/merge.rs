//! Combining text relevance results with geospatial candidates.

use ahash::AHashSet;
use tracing::{debug, warn};

use crate::city::{CityRecord, GeoHash};

/// Maximum number of records returned to a caller.
pub const DEFAULT_RESULT_CAP: usize = 50;

/// Merges text results with optional geospatial results.
///
/// Without geo results this is the first `cap` text results. With geo results
/// the text results are filtered to those whose [`GeoHash`] also appears in
/// `geo`, keeping text relevance order, then capped. Proximity only filters;
/// it never reorders.
pub fn merge(mut text: Vec<CityRecord>, geo: Option<&[CityRecord]>, cap: usize) -> Vec<CityRecord> {
    let Some(geo) = geo else {
        text.truncate(cap);
        return text;
    };

    let nearby: AHashSet<GeoHash> = geo.iter().map(CityRecord::geo_hash).collect();
    let text_len = text.len();
    let merged: Vec<CityRecord> = text
        .into_iter()
        .filter(|record| nearby.contains(&record.geo_hash()))
        .take(cap)
        .collect();

    if merged.is_empty() && text_len > 0 && !nearby.is_empty() {
        // Both sides had hits but none share a key: possible geohash drift
        // between the two indexes.
        warn!(
            text_hits = text_len,
            geo_hits = nearby.len(),
            "Text and geo results did not intersect"
        );
    }
    debug!(
        text_hits = text_len,
        geo_hits = nearby.len(),
        merged = merged.len(),
        cap,
        "Merged text and geo results"
    );
    merged
}
