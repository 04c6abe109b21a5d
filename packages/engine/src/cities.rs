//! City base-rate table.
//!
//! The built-in table is embedded at compile time from
//! `cities/us_cities.toml`. Lookups are case- and whitespace-insensitive,
//! fall back to a substring match in table order, and finally to a rate
//! derived from an MD5 digest of the name, so every city string resolves to
//! the same rate on every call and in every process.

use std::collections::BTreeSet;

use crime_rate_prediction_models::round2;
use serde::Deserialize;
use thiserror::Error;

const US_CITIES_TOML: &str = include_str!("../cities/us_cities.toml");

/// Rate used when no city is given.
pub const NEUTRAL_BASE_RATE: f64 = 1.0;
/// Lowest rate the hash fallback can produce.
pub const FALLBACK_MIN_RATE: f64 = 0.8;
/// Width of the hash fallback range.
pub const FALLBACK_RATE_SPAN: f64 = 1.2;

/// Errors raised while building a [`CityTable`].
#[derive(Debug, Error)]
pub enum CityTableError {
    /// The TOML could not be parsed.
    #[error("Failed to parse city table: {0}")]
    Parse(#[from] toml::de::Error),

    /// An entry is unusable.
    #[error("Invalid city entry '{name}': {message}")]
    InvalidEntry {
        /// Name of the offending entry.
        name: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CityEntry {
    /// Lowercase lookup key.
    pub name: String,
    /// Display name.
    pub label: String,
    /// Multiplier relative to a neutral city.
    pub base_rate: f64,
    /// Whether the city is offered as a suggestion.
    #[serde(default)]
    pub sample: bool,
}

#[derive(Debug, Deserialize)]
struct CityTableFile {
    cities: Vec<CityEntry>,
}

/// How a city name was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CityMatch<'a> {
    /// No city given.
    Absent,
    /// Normalized name equals a table key.
    Exact(&'a CityEntry),
    /// A table key and the normalized name contain one another.
    Partial(&'a CityEntry),
    /// Nothing matched; rate derived from the name's digest.
    Hashed(f64),
}

impl CityMatch<'_> {
    /// The base rate this resolution yields.
    #[must_use]
    pub const fn base_rate(&self) -> f64 {
        match self {
            Self::Absent => NEUTRAL_BASE_RATE,
            Self::Exact(entry) | Self::Partial(entry) => entry.base_rate,
            Self::Hashed(rate) => *rate,
        }
    }
}

/// Immutable, ordered city table.
#[derive(Debug, Clone, PartialEq)]
pub struct CityTable {
    entries: Vec<CityEntry>,
}

impl CityTable {
    /// Returns the embedded US city table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the table is embedded).
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml(US_CITIES_TOML)
            .unwrap_or_else(|e| panic!("Failed to load embedded city table: {e}"))
    }

    /// Parses a table from TOML with a `[[cities]]` array.
    ///
    /// # Errors
    ///
    /// Returns [`CityTableError`] if the TOML is malformed, a name is empty,
    /// not lowercase, padded with whitespace, or duplicated, or a base rate
    /// is not a positive finite number.
    pub fn from_toml(toml_str: &str) -> Result<Self, CityTableError> {
        let file: CityTableFile = toml::de::from_str(toml_str)?;
        Self::from_entries(file.cities)
    }

    /// Builds a table from entries, keeping their order.
    ///
    /// # Errors
    ///
    /// See [`CityTable::from_toml`].
    pub fn from_entries(entries: Vec<CityEntry>) -> Result<Self, CityTableError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            let invalid = |message: &str| CityTableError::InvalidEntry {
                name: entry.name.clone(),
                message: message.to_string(),
            };

            if entry.name.is_empty() {
                return Err(invalid("name is empty"));
            }
            if entry.name != normalize(&entry.name) {
                return Err(invalid("name must be lowercase without surrounding whitespace"));
            }
            if !entry.base_rate.is_finite() || entry.base_rate <= 0.0 {
                return Err(invalid("base_rate must be positive and finite"));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(invalid("duplicate name"));
            }
        }

        Ok(Self { entries })
    }

    /// Entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[CityEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display names of the entries flagged as suggestions.
    #[must_use]
    pub fn sample_labels(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.sample)
            .map(|e| e.label.as_str())
            .collect()
    }

    /// Resolves a city name.
    ///
    /// Only `None` and the empty string count as absent. A whitespace-only
    /// name normalizes to `""`, which every key contains, so it resolves to
    /// the first entry.
    #[must_use]
    pub fn resolve(&self, city: Option<&str>) -> CityMatch<'_> {
        let Some(city) = city.filter(|c| !c.is_empty()) else {
            return CityMatch::Absent;
        };

        let key = normalize(city);

        if let Some(entry) = self.entries.iter().find(|e| e.name == key) {
            return CityMatch::Exact(entry);
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| key.contains(e.name.as_str()) || e.name.contains(key.as_str()))
        {
            return CityMatch::Partial(entry);
        }

        CityMatch::Hashed(hashed_base_rate(&key))
    }

    /// Shorthand for `self.resolve(city).base_rate()`.
    #[must_use]
    pub fn base_rate(&self, city: Option<&str>) -> f64 {
        self.resolve(city).base_rate()
    }
}

impl Default for CityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Maps a normalized name into
/// `[FALLBACK_MIN_RATE, FALLBACK_MIN_RATE + FALLBACK_RATE_SPAN)`, rounded to
/// 2 decimals.
#[must_use]
pub fn hashed_base_rate(normalized: &str) -> f64 {
    let digest = md5::compute(normalized.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.0[..8]);
    let bucket = u64::from_be_bytes(prefix) % 100;

    #[allow(clippy::cast_precision_loss)]
    let fraction = bucket as f64 / 100.0;
    #[allow(clippy::suboptimal_flops)]
    let rate = FALLBACK_MIN_RATE + fraction * FALLBACK_RATE_SPAN;
    round2(rate)
}
