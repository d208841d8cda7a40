//! FHIR date search parameters
//!
//! Parses a `date` search value such as `ge2020-06` into a prefix and an
//! absolute instant range, and builds the predicate the query engine applies
//! to the stored value.
//!
//! # Examples
//!
//! ```rust
//! use ferrum_date_search::{date_query, DateSearchConfig, SearchPrefix};
//!
//! # fn example() -> ferrum_date_search::Result<()> {
//! let config = DateSearchConfig::default();
//! let fragment = date_query(&config, "Patient.birthDate", "ap2020-06", None)?;
//! assert_eq!(fragment.prefix, SearchPrefix::Ap);
//! assert_eq!(fragment.field, "Patient.birthDate");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod parser;
pub mod predicate;
pub mod prefix;
pub mod sql;

pub use config::{ApproximationPolicy, DateSearchConfig};
pub use error::{Error, Result};
pub use parser::{
    parse_date_param, parse_date_param_with_offset, DateRange, ParsedDateParam, PartialDateTime,
    Precision,
};
pub use predicate::{
    approximate_range, build_date_predicate, CompareOp, Condition, QueryFragment, StoredBound,
};
pub use prefix::SearchPrefix;
pub use sql::{render_sql, BindValue, SqlColumns};

/// Gate, parse and build a date search value for `field`.
///
/// Either the whole value is accepted or an error is returned before any
/// predicate is built.
pub fn date_query(
    config: &DateSearchConfig,
    field: &str,
    value: &str,
    modifier: Option<&str>,
) -> Result<QueryFragment> {
    let _span = tracing::debug_span!("date_query", field, value).entered();

    config.check_modifier(modifier)?;
    config.validate()?;
    let parsed = parse_date_param_with_offset(value, config.offset()?)?;
    Ok(build_date_predicate(
        parsed.prefix,
        parsed.range,
        field,
        &config.approximation,
    ))
}
