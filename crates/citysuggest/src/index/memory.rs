use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;
use tracing::{debug, instrument};

use super::{GeoIndexClient, GeoIndexWriter, IndexError, run_blocking};
use crate::city::{Coordinates, GeoCandidate, GeoHash};
use crate::geohash;

#[derive(Debug, Clone, Copy)]
struct Member {
    location: Coordinates,
    geo_hash: GeoHash,
}

/// In-process geospatial index keyed by member name.
///
/// Scores are assigned with [`geohash::encode`], so they agree with whatever
/// ingestion writes into the text index. Re-adding a name moves the member.
/// Radius scans run on the blocking pool.
#[derive(Debug, Default)]
pub struct MemoryGeoIndex {
    members: Arc<RwLock<AHashMap<String, Member>>>,
}

impl MemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members
            .read()
            .map_or(0, |members| members.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn within(
    members: &RwLock<AHashMap<String, Member>>,
    center: Coordinates,
    radius_km: f64,
    max_results: usize,
) -> Result<Vec<GeoCandidate>, IndexError> {
    let members = members.read().map_err(poisoned)?;
    let mut candidates: Vec<GeoCandidate> = members
        .iter()
        .filter_map(|(name, member)| {
            let distance_km = geohash::haversine_km(center, member.location);
            (distance_km <= radius_km).then(|| GeoCandidate {
                name: name.clone(),
                geo_hash: member.geo_hash,
                distance_km,
                coordinates: member.location,
            })
        })
        .collect();
    drop(members);

    candidates.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.name.cmp(&b.name))
    });
    candidates.truncate(max_results);
    Ok(candidates)
}

impl GeoIndexClient for MemoryGeoIndex {
    #[instrument(name = "Geo radius query", skip(self), level = "debug")]
    async fn radius_query(
        &self,
        center: Coordinates,
        radius_km: f64,
        max_results: usize,
    ) -> Result<Vec<GeoCandidate>, IndexError> {
        let members = Arc::clone(&self.members);
        let candidates =
            run_blocking(move || within(&members, center, radius_km, max_results)).await?;
        debug!(found = candidates.len(), "Geo radius query complete");
        Ok(candidates)
    }
}

impl GeoIndexWriter for MemoryGeoIndex {
    fn add(&self, name: &str, location: Coordinates) -> Result<GeoHash, IndexError> {
        let geo_hash = geohash::encode(location);
        self.members
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), Member { location, geo_hash });
        Ok(geo_hash)
    }

    fn score(&self, name: &str) -> Result<Option<GeoHash>, IndexError> {
        let members = self.members.read().map_err(poisoned)?;
        Ok(members.get(name).map(|member| member.geo_hash))
    }
}

fn poisoned<T>(_: PoisonError<T>) -> IndexError {
    IndexError::Unavailable("geo index lock poisoned".to_string())
}
