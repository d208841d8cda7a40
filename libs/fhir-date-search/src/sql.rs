//! Postgres rendering of date query fragments.
//!
//! Instants are bound as positional text parameters and cast to
//! `timestamptz`, matching the search index layout (`start_date`/`end_date`
//! columns per indexed value).

use crate::predicate::{Condition, QueryFragment, StoredBound};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
}

/// Column expressions holding the stored period bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlColumns<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

impl SqlColumns<'static> {
    /// `search_date` rows aliased as `sp`.
    pub const SEARCH_INDEX: Self = SqlColumns {
        start: "sp.start_date",
        end: "sp.end_date",
    };
}

impl SqlColumns<'_> {
    fn column(&self, bound: StoredBound) -> &str {
        match bound {
            StoredBound::Start => self.start,
            StoredBound::End => self.end,
        }
    }
}

/// Renders `fragment` as a boolean SQL expression, appending its parameters to
/// `bind_params`. Placeholders continue numbering after any existing binds.
pub fn render_sql(
    fragment: &QueryFragment,
    columns: &SqlColumns<'_>,
    bind_params: &mut Vec<BindValue>,
) -> String {
    render_condition(&fragment.condition, columns, bind_params)
}

fn render_condition(
    condition: &Condition,
    columns: &SqlColumns<'_>,
    bind_params: &mut Vec<BindValue>,
) -> String {
    match condition {
        Condition::Compare { bound, op, value } => {
            let idx = push_text(bind_params, value.to_rfc3339());
            format!(
                "{} {} ${}::timestamptz",
                columns.column(*bound),
                op.as_sql(),
                idx
            )
        }
        Condition::All { conditions } => conjunction(conditions, columns, bind_params),
        Condition::Not { condition } => {
            format!("NOT ({})", render_condition(condition, columns, bind_params))
        }
    }
}

fn conjunction(
    conditions: &[Condition],
    columns: &SqlColumns<'_>,
    bind_params: &mut Vec<BindValue>,
) -> String {
    let mut parts = Vec::with_capacity(conditions.len());
    for c in conditions {
        parts.push(render_condition(c, columns, bind_params));
    }

    if parts.is_empty() {
        "TRUE".to_string()
    } else if parts.len() == 1 {
        parts.remove(0)
    } else {
        format!("({})", parts.join(" AND "))
    }
}

fn push_text(bind_params: &mut Vec<BindValue>, value: String) -> usize {
    bind_params.push(BindValue::Text(value));
    bind_params.len()
}
