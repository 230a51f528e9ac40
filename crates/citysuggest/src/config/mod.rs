use std::path::Path;
use std::time::Duration;

pub use error::ConfigError;
use serde::{Deserialize, Serialize};

use crate::merge::DEFAULT_RESULT_CAP;

/// Tunables for the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Maximum records returned by a text search.
    pub result_cap: usize,
    /// Maximum records returned by a coordinate lookup.
    pub coord_result_cap: usize,
    /// Search radius around the supplied coordinates.
    pub radius_km: f64,
    /// How many geo candidates to fetch when filtering text results.
    pub geo_candidate_limit: usize,
    pub text_offset: usize,
    /// How many text candidates to fetch before filtering and capping.
    pub text_limit: usize,
    /// Deadline for one whole query, both index calls included.
    #[serde(with = "duration_millis", rename = "query_timeout_ms")]
    pub query_timeout: Duration,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            result_cap: DEFAULT_RESULT_CAP,
            coord_result_cap: 25,
            radius_km: 100.0,
            geo_candidate_limit: 1000,
            text_offset: 0,
            text_limit: 100,
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl SuggestConfig {
    pub fn builder() -> SuggestConfigBuilder {
        SuggestConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius_km));
        }
        if self.text_limit == 0 {
            return Err(ConfigError::ZeroTextLimit);
        }
        if self.query_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Reads a JSON config file. Missing keys take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for [`SuggestConfig`] with a few presets.
#[derive(Debug, Clone, Default)]
pub struct SuggestConfigBuilder {
    config: SuggestConfig,
}

impl SuggestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SuggestConfig::default(),
        }
    }

    /// Fewer candidates and a tight deadline, for interactive suggestions.
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.result_cap = 10;
        builder.config.coord_result_cap = 10;
        builder.config.geo_candidate_limit = 250;
        builder.config.text_limit = 25;
        builder.config.query_timeout = Duration::from_millis(500);
        builder
    }

    /// Wider radius and deeper candidate lists.
    pub fn comprehensive() -> Self {
        let mut builder = Self::new();
        builder.config.radius_km = 250.0;
        builder.config.geo_candidate_limit = 5000;
        builder.config.text_limit = 500;
        builder.config.query_timeout = Duration::from_secs(15);
        builder
    }

    pub fn result_cap(mut self, cap: usize) -> Self {
        self.config.result_cap = cap;
        self
    }

    pub fn coord_result_cap(mut self, cap: usize) -> Self {
        self.config.coord_result_cap = cap;
        self
    }

    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.config.radius_km = radius_km;
        self
    }

    pub fn geo_candidate_limit(mut self, limit: usize) -> Self {
        self.config.geo_candidate_limit = limit;
        self
    }

    /// Window of text candidates requested from the text index.
    pub fn text_window(mut self, offset: usize, limit: usize) -> Self {
        self.config.text_offset = offset;
        self.config.text_limit = limit;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SuggestConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Search radius must be a positive number of kilometres, got {0}")]
        InvalidRadius(f64),
        #[error("Text candidate limit must be greater than zero")]
        ZeroTextLimit,
        #[error("Query timeout must be greater than zero")]
        ZeroTimeout,
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
    }
}
