//! Date search configuration
//!
//! Values are layered the same way the server configuration is: built-in
//! defaults, then an optional file, then `FERRUM_DATE_SEARCH__*` environment
//! variables (e.g. `FERRUM_DATE_SEARCH__DEFAULT_OFFSET=+01:00`).

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::parser::{parse_offset, utc};

const ENV_PREFIX: &str = "FERRUM_DATE_SEARCH";

/// Upper bound for `approximation.percent`.
pub const MAX_APPROXIMATION_PERCENT: u32 = 1_000;

/// Upper bound for `approximation.minimum_seconds` (100 Julian years).
pub const MAX_APPROXIMATION_MINIMUM_SECONDS: i64 = 100 * 31_557_600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSearchConfig {
    /// Modifiers accepted on date parameters (`birthdate:<modifier>`). Empty by default.
    pub supported_modifiers: BTreeSet<String>,

    /// Offset applied to values written without one: `Z` or `±hh:mm`.
    pub default_offset: String,

    pub approximation: ApproximationPolicy,
}

impl Default for DateSearchConfig {
    fn default() -> Self {
        Self {
            supported_modifiers: BTreeSet::new(),
            default_offset: "Z".to_string(),
            approximation: ApproximationPolicy::default(),
        }
    }
}

/// Tolerance used by the `ap` prefix: the larger of `percent` of the searched
/// span and `minimum_seconds`, applied on both sides of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximationPolicy {
    pub percent: u32,
    pub minimum_seconds: i64,
}

impl Default for ApproximationPolicy {
    fn default() -> Self {
        Self {
            percent: 10,
            minimum_seconds: 86_400,
        }
    }
}

impl ApproximationPolicy {
    /// Saturates instead of overflowing for out-of-range policies.
    pub fn tolerance(&self, span: Duration) -> Duration {
        let minimum = Duration::milliseconds(self.minimum_seconds.max(0).saturating_mul(1000));
        let span_ms = span.num_milliseconds().max(0);
        let scaled = (span_ms / 100).saturating_mul(i64::from(self.percent));
        Duration::milliseconds(scaled).max(minimum)
    }
}

impl DateSearchConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("supported_modifiers")
                .try_parsing(true),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        tracing::debug!(
            modifiers = cfg.supported_modifiers.len(),
            default_offset = %cfg.default_offset,
            "loaded date search configuration"
        );
        Ok(cfg)
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.supported_modifiers.insert(modifier.into());
        self
    }

    pub fn with_default_offset(mut self, offset: impl Into<String>) -> Self {
        self.default_offset = offset.into();
        self
    }

    pub fn with_approximation(mut self, approximation: ApproximationPolicy) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.offset()?;
        let approximation = &self.approximation;
        if approximation.percent > MAX_APPROXIMATION_PERCENT {
            return Err(Error::Config(::config::ConfigError::Message(format!(
                "approximation.percent must be at most {}",
                MAX_APPROXIMATION_PERCENT
            ))));
        }
        if !(0..=MAX_APPROXIMATION_MINIMUM_SECONDS).contains(&approximation.minimum_seconds) {
            return Err(Error::Config(::config::ConfigError::Message(format!(
                "approximation.minimum_seconds must be between 0 and {}",
                MAX_APPROXIMATION_MINIMUM_SECONDS
            ))));
        }
        Ok(())
    }

    /// The reference offset for values written without one.
    pub fn offset(&self) -> Result<FixedOffset> {
        if self.default_offset.is_empty() {
            return Ok(utc());
        }
        parse_offset(&self.default_offset).ok_or_else(|| {
            Error::Config(::config::ConfigError::Message(format!(
                "invalid default_offset '{}': expected 'Z' or ±hh:mm",
                self.default_offset
            )))
        })
    }

    /// Rejects any non-empty modifier missing from the allow-list.
    pub fn check_modifier(&self, modifier: Option<&str>) -> Result<()> {
        match modifier {
            None | Some("") => Ok(()),
            Some(m) if self.supported_modifiers.contains(m) => Ok(()),
            Some(m) => {
                tracing::debug!(modifier = m, "rejected date search modifier");
                Err(Error::UnsupportedModifier(m.to_string()))
            }
        }
    }
}
