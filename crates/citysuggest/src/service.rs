//! The query pipeline: validate, query both indexes, decode, merge.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::city::{CityRecord, Coordinates};
use crate::config::SuggestConfig;
use crate::coordinate::{ValidationError, validate, validate_required};
use crate::decode::decode_search_response;
use crate::error::{Result, SuggestError};
use crate::index::{GeoIndexClient, SearchIndexClient};
use crate::merge::merge;

/// Answers coordinate and text queries over an injected pair of index clients.
///
/// Holds no per-request state, so one instance can serve concurrent queries.
///
/// ```rust
/// use citysuggest::index::{GeoIndexWriter, MemoryGeoIndex, TantivySearchIndex, TextIndexWriter};
/// use citysuggest::{CitySuggester, Coordinates, SchemaGeneration, SuggestConfig};
///
/// let geo = MemoryGeoIndex::new();
/// let text = TantivySearchIndex::in_memory(SchemaGeneration::NameCountry)?;
/// let key = geo.add("Paris", Coordinates::new(2.3522, 48.8566))?;
/// text.add_document(key.bits(), "Paris", "FR")?;
/// text.commit()?;
///
/// let suggester = CitySuggester::new(geo, text, SuggestConfig::default());
/// let runtime = tokio::runtime::Runtime::new()?;
/// let cities = runtime.block_on(suggester.cities_by_search("par", Some("2.35"), Some("48.85")))?;
/// assert_eq!(cities[0].name(), "Paris");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct CitySuggester<G, S> {
    geo: G,
    search: S,
    config: SuggestConfig,
}

impl<G: GeoIndexClient, S: SearchIndexClient> CitySuggester<G, S> {
    pub const fn new(geo: G, search: S, config: SuggestConfig) -> Self {
        Self {
            geo,
            search,
            config,
        }
    }

    pub const fn config(&self) -> &SuggestConfig {
        &self.config
    }

    pub const fn geo_index(&self) -> &G {
        &self.geo
    }

    pub const fn search_index(&self) -> &S {
        &self.search
    }

    /// Cities within the configured radius of a coordinate, nearest first.
    pub async fn cities_by_coordinate(
        &self,
        longitude: Option<&str>,
        latitude: Option<&str>,
    ) -> Result<Vec<CityRecord>> {
        self.cities_by_coordinate_with_cancel(longitude, latitude, &CancellationToken::new())
            .await
    }

    #[instrument(name = "Cities by coordinate", skip(self, cancel), level = "info")]
    pub async fn cities_by_coordinate_with_cancel(
        &self,
        longitude: Option<&str>,
        latitude: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CityRecord>> {
        let center = validate_required(longitude, latitude)?;
        let records = self.bounded(self.nearby(center), cancel).await?;
        info!(returned = records.len(), "Coordinate query complete");
        Ok(records)
    }

    /// Text matches in relevance order, filtered by proximity when both
    /// coordinates are supplied.
    pub async fn cities_by_search(
        &self,
        query: &str,
        longitude: Option<&str>,
        latitude: Option<&str>,
    ) -> Result<Vec<CityRecord>> {
        self.cities_by_search_with_cancel(query, longitude, latitude, &CancellationToken::new())
            .await
    }

    #[instrument(name = "Cities by search", skip(self, cancel), level = "info")]
    pub async fn cities_by_search_with_cancel(
        &self,
        query: &str,
        longitude: Option<&str>,
        latitude: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CityRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::MissingQuery.into());
        }
        let center = validate(longitude, latitude)?;
        if center.is_none() {
            debug!("Optional 'lng' or 'lat' not set");
        }

        let records = self.bounded(self.search_and_merge(query, center), cancel).await?;
        info!(returned = records.len(), "Search query complete");
        Ok(records)
    }

    async fn nearby(&self, center: Coordinates) -> Result<Vec<CityRecord>> {
        let candidates = self
            .geo
            .radius_query(center, self.config.radius_km, self.config.coord_result_cap)
            .await?;
        Ok(candidates.into_iter().map(CityRecord::from).collect())
    }

    async fn search_and_merge(
        &self,
        query: &str,
        center: Option<Coordinates>,
    ) -> Result<Vec<CityRecord>> {
        let geo = async {
            match center {
                Some(center) => self
                    .geo
                    .radius_query(
                        center,
                        self.config.radius_km,
                        self.config.geo_candidate_limit,
                    )
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let text = self.search.text_query(
            query,
            self.config.text_offset,
            self.config.text_limit,
        );

        let (geo, raw) = tokio::try_join!(geo, text)?;
        let text_records = decode_search_response(&raw)?;
        let geo_records: Option<Vec<CityRecord>> =
            geo.map(|candidates| candidates.into_iter().map(CityRecord::from).collect());

        Ok(merge(
            text_records,
            geo_records.as_deref(),
            self.config.result_cap,
        ))
    }

    /// Runs `work` under the configured deadline and the caller's token.
    /// Dropping `work` on either condition drops every outstanding index call.
    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T>>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let timeout = self.config.query_timeout;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SuggestError::Cancelled),
            outcome = tokio::time::timeout(timeout, work) => {
                outcome.unwrap_or_else(|_| Err(SuggestError::Timeout(timeout)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::city::{GeoCandidate, GeoHash};
    use crate::config::SuggestConfigBuilder;
    use crate::coordinate::CoordinateField;
    use crate::decode::{RawResponse, RawValue, SchemaGeneration};
    use crate::index::{IndexError, run_blocking};

    #[derive(Default)]
    struct FakeGeo {
        candidates: Vec<GeoCandidate>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
        last_limit: AtomicUsize,
    }

    impl FakeGeo {
        fn with_keys(keys: &[u64]) -> Self {
            Self {
                candidates: keys
                    .iter()
                    .enumerate()
                    .map(|(i, &k)| GeoCandidate {
                        name: format!("geo-{k}"),
                        geo_hash: GeoHash::new(k),
                        distance_km: i as f64,
                        coordinates: Coordinates::new(2.0, 48.0),
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl GeoIndexClient for FakeGeo {
        async fn radius_query(
            &self,
            _center: Coordinates,
            _radius_km: f64,
            max_results: usize,
        ) -> std::result::Result<Vec<GeoCandidate>, IndexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(max_results, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(IndexError::Unavailable("geo down".to_string()));
            }
            Ok(self.candidates.iter().take(max_results).cloned().collect())
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        response: RawResponse,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeSearch {
        fn with_keys(keys: &[u64]) -> Self {
            let mut response = vec![RawValue::Integer(keys.len() as i64)];
            for k in keys {
                response.push(RawValue::Text(k.to_string()));
                let name = format!("city-{k}");
                response.push(SchemaGeneration::NameCountry.field_array(&name, "FR"));
            }
            Self {
                response,
                ..Self::default()
            }
        }
    }

    impl SearchIndexClient for FakeSearch {
        async fn text_query(
            &self,
            _query: &str,
            _offset: usize,
            _limit: usize,
        ) -> std::result::Result<RawResponse, IndexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(IndexError::QueryRejected("syntax".to_string()));
            }
            Ok(self.response.clone())
        }
    }

    /// Text index whose search is synchronous and slow, run like the bundled adapters.
    struct BlockingSearch {
        work: Duration,
    }

    impl SearchIndexClient for BlockingSearch {
        async fn text_query(
            &self,
            _query: &str,
            _offset: usize,
            _limit: usize,
        ) -> std::result::Result<RawResponse, IndexError> {
            let work = self.work;
            run_blocking(move || {
                std::thread::sleep(work);
                Ok(vec![RawValue::Integer(0)])
            })
            .await
        }
    }

    fn keys(records: &[CityRecord]) -> Vec<u64> {
        records.iter().map(|r| r.geo_hash().bits()).collect()
    }

    fn suggester(geo: FakeGeo, search: FakeSearch) -> CitySuggester<FakeGeo, FakeSearch> {
        CitySuggester::new(geo, search, SuggestConfig::default())
    }

    #[tokio::test]
    async fn test_search_without_coordinates_skips_geo() {
        let s = suggester(FakeGeo::with_keys(&[1]), FakeSearch::with_keys(&[3, 1, 2]));

        let records = s.cities_by_search("par", None, None).await.unwrap();

        assert_eq!(keys(&records), vec![3, 1, 2]);
        assert_eq!(s.geo_index().calls.load(Ordering::SeqCst), 0);
        assert_eq!(s.search_index().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_with_coordinates_filters_by_geo() {
        let s = suggester(FakeGeo::with_keys(&[7]), FakeSearch::with_keys(&[7, 9]));

        let records = s
            .cities_by_search("par", Some("2.35"), Some("48.85"))
            .await
            .unwrap();

        assert_eq!(keys(&records), vec![7]);
        assert_eq!(records[0].country(), Some("FR"));
        assert_eq!(s.geo_index().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            s.geo_index().last_limit.load(Ordering::SeqCst),
            SuggestConfig::default().geo_candidate_limit
        );
    }

    #[tokio::test]
    async fn test_search_caps_results() {
        let text: Vec<u64> = (0..80).collect();
        let s = suggester(FakeGeo::with_keys(&text), FakeSearch::with_keys(&text));

        let plain = s.cities_by_search("par", None, None).await.unwrap();
        let near = s
            .cities_by_search("par", Some("2"), Some("48"))
            .await
            .unwrap();

        assert_eq!(plain.len(), 50);
        assert_eq!(near.len(), 50);
        assert_eq!(keys(&near), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_any_index_call() {
        let s = suggester(FakeGeo::default(), FakeSearch::with_keys(&[1]));

        for query in ["", "   "] {
            let err = s.cities_by_search(query, None, None).await.unwrap_err();
            assert!(matches!(
                err,
                SuggestError::Validation(ValidationError::MissingQuery)
            ));
        }
        assert_eq!(s.search_index().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fail_the_search() {
        let s = suggester(FakeGeo::default(), FakeSearch::with_keys(&[1]));

        let err = s
            .cities_by_search("par", Some("200"), Some("0"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SuggestError::Validation(ValidationError::InvalidLongitude(_))
        ));
        assert_eq!(err.status(), 400);
        assert_eq!(s.search_index().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_supplied_coordinates_are_ignored_for_search() {
        let s = suggester(FakeGeo::with_keys(&[1]), FakeSearch::with_keys(&[1, 2]));

        let records = s.cities_by_search("par", Some("2.0"), None).await.unwrap();
        assert_eq!(keys(&records), vec![1, 2]);
        assert_eq!(s.geo_index().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_failures_propagate() {
        let geo = FakeGeo {
            fail: true,
            ..FakeGeo::default()
        };
        let s = suggester(geo, FakeSearch::with_keys(&[1]));
        let err = s
            .cities_by_search("par", Some("2"), Some("48"))
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::Index(IndexError::Unavailable(_))));
        assert_eq!(err.status(), 500);

        let search = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let s = suggester(FakeGeo::default(), search);
        let err = s.cities_by_search("par", None, None).await.unwrap_err();
        assert!(matches!(err, SuggestError::Index(IndexError::QueryRejected(_))));
    }

    #[tokio::test]
    async fn test_corrupt_text_response_fails_whole_request() {
        let search = FakeSearch {
            response: vec![
                RawValue::Integer(2),
                RawValue::text("1"),
                SchemaGeneration::NameOnly.field_array("Ok", ""),
                RawValue::text("2"),
                RawValue::Array(vec![RawValue::text("name")]),
            ],
            ..FakeSearch::default()
        };
        let s = suggester(FakeGeo::default(), search);

        let err = s.cities_by_search("par", None, None).await.unwrap_err();
        assert!(matches!(err, SuggestError::Decode(_)));
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_geo_and_text_run_concurrently() {
        let delay = Duration::from_millis(200);
        let geo = FakeGeo {
            delay: Some(delay),
            ..FakeGeo::with_keys(&[1])
        };
        let search = FakeSearch {
            delay: Some(delay),
            ..FakeSearch::with_keys(&[1])
        };
        let config = SuggestConfig::builder()
            .query_timeout(Duration::from_millis(350))
            .build()
            .unwrap();
        let s = CitySuggester::new(geo, search, config);

        // Sequential calls would need 400ms and trip the 350ms deadline.
        let records = s
            .cities_by_search("par", Some("2"), Some("48"))
            .await
            .unwrap();
        assert_eq!(keys(&records), vec![1]);
    }

    #[tokio::test]
    async fn test_deadline_fails_the_query() {
        let search = FakeSearch {
            delay: Some(Duration::from_secs(30)),
            ..FakeSearch::with_keys(&[1])
        };
        let config = SuggestConfig::builder()
            .query_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        let s = CitySuggester::new(FakeGeo::default(), search, config);

        let err = s.cities_by_search("par", None, None).await.unwrap_err();
        assert!(matches!(err, SuggestError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_synchronous_index_work() {
        let config = SuggestConfig::builder()
            .query_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        let search = BlockingSearch {
            work: Duration::from_millis(500),
        };
        let s = CitySuggester::new(FakeGeo::default(), search, config);

        let started = std::time::Instant::now();
        let err = s.cities_by_search("par", None, None).await.unwrap_err();

        assert!(matches!(err, SuggestError::Timeout(_)));
        assert!(
            started.elapsed() < Duration::from_millis(400),
            "returned after {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_cancellation_fails_the_query() {
        let geo = FakeGeo {
            delay: Some(Duration::from_secs(30)),
            ..FakeGeo::with_keys(&[1])
        };
        let s = suggester(geo, FakeSearch::with_keys(&[1]));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };
        let err = s
            .cities_by_search_with_cancel("par", Some("2"), Some("48"), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, SuggestError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_wins() {
        let s = suggester(FakeGeo::with_keys(&[1]), FakeSearch::with_keys(&[1]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = s
            .cities_by_coordinate_with_cancel(Some("2"), Some("48"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::Cancelled));
    }

    #[tokio::test]
    async fn test_coordinate_query_returns_geo_records() {
        let s = suggester(FakeGeo::with_keys(&(0..40).collect::<Vec<_>>()), FakeSearch::default());

        let records = s
            .cities_by_coordinate(Some("2.35"), Some("48.85"))
            .await
            .unwrap();

        assert_eq!(records.len(), 25);
        assert!(records.iter().all(|r| r.coordinates().is_some()));
        assert!(records.iter().all(|r| r.score().is_none()));
        assert_eq!(s.search_index().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_configured_caps_are_applied() {
        let config = SuggestConfigBuilder::fast().build().unwrap();
        let all: Vec<u64> = (0..40).collect();
        let s = CitySuggester::new(FakeGeo::with_keys(&all), FakeSearch::with_keys(&all), config);

        assert_eq!(s.config().result_cap, 10);
        let near = s.cities_by_coordinate(Some("2"), Some("48")).await.unwrap();
        let text = s.cities_by_search("par", None, None).await.unwrap();
        assert_eq!(near.len(), s.config().coord_result_cap);
        assert_eq!(text.len(), s.config().result_cap);
    }

    #[tokio::test]
    async fn test_coordinate_query_requires_both_values() {
        let s = suggester(FakeGeo::default(), FakeSearch::default());

        let err = s.cities_by_coordinate(Some("2"), None).await.unwrap_err();
        assert!(matches!(
            err,
            SuggestError::Validation(ValidationError::MissingCoordinate(
                CoordinateField::Latitude
            ))
        ));
        assert_eq!(s.geo_index().calls.load(Ordering::SeqCst), 0);
    }
}
