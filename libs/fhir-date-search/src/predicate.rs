//! Date predicate building
//!
//! Turns a prefix and a search range into a declarative condition over the
//! stored value. Stored values are treated as periods `[start, end]`; a single
//! instant is a period whose bounds coincide.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ApproximationPolicy;
use crate::parser::DateRange;
use crate::prefix::SearchPrefix;

/// Which bound of the stored period a comparison reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredBound {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    pub fn holds(self, stored: DateTime<Utc>, value: DateTime<Utc>) -> bool {
        match self {
            Self::Lt => stored < value,
            Self::Le => stored <= value,
            Self::Gt => stored > value,
            Self::Ge => stored >= value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Compare {
        bound: StoredBound,
        op: CompareOp,
        value: DateTime<Utc>,
    },
    All { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    fn compare(bound: StoredBound, op: CompareOp, value: DateTime<Utc>) -> Self {
        Condition::Compare { bound, op, value }
    }

    /// Stored period lies within `range`.
    fn within(range: DateRange) -> Self {
        Condition::All {
            conditions: vec![
                Self::compare(StoredBound::Start, CompareOp::Ge, range.start),
                Self::compare(StoredBound::End, CompareOp::Le, range.end),
            ],
        }
    }

    /// Evaluates the condition against a stored period.
    pub fn matches(&self, stored: DateRange) -> bool {
        match self {
            Condition::Compare { bound, op, value } => {
                let side = match bound {
                    StoredBound::Start => stored.start,
                    StoredBound::End => stored.end,
                };
                op.holds(side, *value)
            }
            Condition::All { conditions } => conditions.iter().all(|c| c.matches(stored)),
            Condition::Not { condition } => !condition.matches(stored),
        }
    }
}

/// Query fragment handed to the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFragment {
    /// Storage path, passed through untouched.
    pub field: String,
    pub prefix: SearchPrefix,
    pub condition: Condition,
}

impl QueryFragment {
    pub fn is_approximate(&self) -> bool {
        self.prefix == SearchPrefix::Ap
    }

    pub fn matches(&self, stored: DateRange) -> bool {
        self.condition.matches(stored)
    }
}

/// Builds the predicate for `prefix` over `range` on `field`.
pub fn build_date_predicate(
    prefix: SearchPrefix,
    range: DateRange,
    field: &str,
    approximation: &ApproximationPolicy,
) -> QueryFragment {
    use CompareOp::*;
    use StoredBound::*;

    let condition = match prefix {
        // eq: stored period falls entirely on the search range
        SearchPrefix::Eq => Condition::within(range),
        SearchPrefix::Ne => Condition::Not {
            condition: Box::new(Condition::within(range)),
        },
        // lt/eb: stored period ends before the range starts
        SearchPrefix::Lt | SearchPrefix::Eb => Condition::compare(End, Lt, range.start),
        // gt/sa: stored period starts after the range ends
        SearchPrefix::Gt | SearchPrefix::Sa => Condition::compare(Start, Gt, range.end),
        SearchPrefix::Ge => Condition::compare(Start, Ge, range.start),
        SearchPrefix::Le => Condition::compare(End, Le, range.end),
        SearchPrefix::Ap => Condition::within(approximate_range(range, approximation)),
    };

    QueryFragment {
        field: field.to_string(),
        prefix,
        condition,
    }
}

/// Widens `range` on both sides by the policy's tolerance, clamped to the
/// representable instants.
pub fn approximate_range(range: DateRange, approximation: &ApproximationPolicy) -> DateRange {
    let delta = approximation.tolerance(range.duration());
    DateRange {
        start: range
            .start
            .checked_sub_signed(delta)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        end: range
            .end
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}
