//! Decoding of the text index's raw positional response.
//!
//! The text engine answers with a flat, loosely typed array:
//!
//! ```text
//! [
//!    total,                                  // integer, informational only
//!    "key_0",                                // decimal string
//!    ["name", name_0, "country", country_0], // or ["name", name_0]
//!    "key_1",
//!    ["name", name_1, "country", country_1],
//!    ...
//! ]
//! ```
//!
//! This module is the only place that knows that layout. Every pair is shape
//! checked and the first malformed pair fails the whole response.

pub use error::DecodeError;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::city::CityRecord;

/// One element of a raw positional response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Text(String),
    Array(Vec<RawValue>),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "string",
            Self::Array(_) => "array",
        }
    }
}

pub type RawResponse = Vec<RawValue>;

/// Field array layouts written by the different index generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaGeneration {
    /// `["name", <name>, "country", <country>]`
    #[default]
    NameCountry,
    /// `["name", <name>]`
    NameOnly,
}

impl SchemaGeneration {
    pub const fn field_count(self) -> usize {
        match self {
            Self::NameCountry => 4,
            Self::NameOnly => 2,
        }
    }

    const fn from_field_count(count: usize) -> Option<Self> {
        match count {
            4 => Some(Self::NameCountry),
            2 => Some(Self::NameOnly),
            _ => None,
        }
    }

    /// Renders the field array this generation stores for a document.
    pub fn field_array(self, name: &str, country: &str) -> RawValue {
        let mut fields = vec![RawValue::text(NAME_KEY), RawValue::text(name)];
        if self == Self::NameCountry {
            fields.push(RawValue::text(COUNTRY_KEY));
            fields.push(RawValue::text(country));
        }
        RawValue::Array(fields)
    }
}

const NAME_KEY: &str = "name";
const COUNTRY_KEY: &str = "country";

/// Decodes a raw response into records, preserving the engine's relevance order.
pub fn decode_search_response(response: &[RawValue]) -> Result<Vec<CityRecord>, DecodeError> {
    let (header, pairs) = response.split_first().ok_or(DecodeError::EmptyResponse)?;
    let RawValue::Integer(total) = header else {
        return Err(DecodeError::MalformedHeader(header.kind()));
    };

    let mut records = Vec::with_capacity(pairs.len() / 2);
    for (pair_index, pair) in pairs.chunks(2).enumerate() {
        let key_position = 1 + pair_index * 2;
        let key = parse_key(&pair[0], key_position)?;
        let fields = pair.get(1).ok_or(DecodeError::MalformedFieldArray {
            position: key_position + 1,
            reason: "missing field array after key".to_string(),
        })?;
        records.push(parse_fields(fields, key_position + 1, key)?);
    }

    trace!(total, decoded = records.len(), "Decoded search response");
    Ok(records)
}

fn parse_key(value: &RawValue, position: usize) -> Result<i64, DecodeError> {
    let RawValue::Text(key) = value else {
        return Err(DecodeError::MalformedScoreField {
            position,
            reason: format!("expected string, found {}", value.kind()),
        });
    };
    key.parse::<i64>()
        .map_err(|e| DecodeError::MalformedScoreField {
            position,
            reason: format!("{key:?} is not an integer: {e}"),
        })
}

fn parse_fields(value: &RawValue, position: usize, key: i64) -> Result<CityRecord, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedFieldArray { position, reason };

    let RawValue::Array(items) = value else {
        return Err(malformed(format!("expected array, found {}", value.kind())));
    };
    let generation = SchemaGeneration::from_field_count(items.len())
        .ok_or_else(|| malformed(format!("expected 2 or 4 elements, found {}", items.len())))?;

    let strings = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            RawValue::Text(s) => Ok(s.as_str()),
            other => Err(malformed(format!(
                "element {i} is {}, expected string",
                other.kind()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if strings[0] != NAME_KEY {
        return Err(malformed(format!(
            "expected {NAME_KEY:?} at index 0, found {:?}",
            strings[0]
        )));
    }

    let country = match generation {
        SchemaGeneration::NameOnly => None,
        SchemaGeneration::NameCountry => {
            if strings[2] != COUNTRY_KEY {
                return Err(malformed(format!(
                    "expected {COUNTRY_KEY:?} at index 2, found {:?}",
                    strings[2]
                )));
            }
            Some(strings[3].to_string())
        }
    };

    Ok(CityRecord::from_text(strings[1], country, key))
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum DecodeError {
        #[error("empty response")]
        EmptyResponse,
        #[error("first element in response is not an integer (found {0})")]
        MalformedHeader(&'static str),
        #[error("element {position} is not an integer key string: {reason}")]
        MalformedScoreField { position: usize, reason: String },
        #[error("element {position} is not a valid city field array: {reason}")]
        MalformedFieldArray { position: usize, reason: String },
    }
}
