//! Predicate tree produced by the filter compiler.
//!
//! The same tree is rendered to parameterized SQL ([`Predicate::to_sql`]) or evaluated against
//! an in-memory JSON row ([`Predicate::matches`]).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

use super::grammar::FilterOp;
use super::search::{contains_ignore_case, contains_pattern};
use crate::query::params::{ParamMap, ParamValue, param_ref};

/// Cast applied to a column before comparing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cast {
    #[default]
    None,
    Text,
    /// Day precision; applied to both sides of the comparison
    Date,
}

/// A column reference, possibly a dotted relation path (`customer.company_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub path: String,
    pub cast: Cast,
}

impl Operand {
    pub fn column(path: impl Into<String>) -> Self {
        Self::cast(path, Cast::None)
    }

    pub fn cast(path: impl Into<String>, cast: Cast) -> Self {
        Self {
            path: path.into(),
            cast,
        }
    }

    fn to_sql(&self) -> String {
        cast_sql(&self.path, self.cast)
    }
}

fn cast_sql(expr: &str, cast: Cast) -> String {
    match cast {
        Cast::None => expr.to_string(),
        Cast::Text => format!("CAST({expr} AS TEXT)"),
        Cast::Date => format!("CAST({expr} AS DATE)"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Lt,
    Gt,
    Le,
    Ge,
}

impl RangeOp {
    #[must_use]
    pub const fn from_filter_op(op: FilterOp) -> Option<Self> {
        match op {
            FilterOp::Lt => Some(Self::Lt),
            FilterOp::Gt => Some(Self::Gt),
            FilterOp::Le => Some(Self::Le),
            FilterOp::Ge => Some(Self::Ge),
            FilterOp::Eq | FilterOp::Contains => None,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: Operand, value: ParamValue },
    /// Case-insensitive substring match
    Like { field: Operand, needle: String },
    Range {
        field: Operand,
        op: RangeOp,
        value: ParamValue,
    },
    IsNull { field: Operand },
    /// Set membership; `values` is a list parameter
    In { field: Operand, values: ParamValue },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

/// Hands out `@P_<n>_` names in call order.
#[derive(Debug, Default)]
pub struct ParamAllocator {
    next: usize,
    params: ParamMap,
}

impl ParamAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, value: ParamValue) -> String {
        let name = format!("P_{}_", self.next);
        self.next += 1;
        let reference = param_ref(&name);
        self.params.insert(name, value);
        reference
    }

    #[must_use]
    pub fn into_params(self) -> ParamMap {
        self.params
    }
}

impl Predicate {
    /// Render to SQL, handing each value to `bind` and splicing in the reference it returns.
    pub fn to_sql<F>(&self, bind: &mut F) -> String
    where
        F: FnMut(ParamValue) -> String,
    {
        match self {
            Self::Eq { field, value } => {
                let reference = bind(value.clone());
                format!("{} = {}", field.to_sql(), param_sql(&reference, field.cast))
            }
            Self::Like { field, needle } => {
                let reference = bind(ParamValue::Text(contains_pattern(needle)));
                format!("{} ILIKE {reference}", field.to_sql())
            }
            Self::Range { field, op, value } => {
                let reference = bind(value.clone());
                format!(
                    "{} {} {}",
                    field.to_sql(),
                    op.symbol(),
                    param_sql(&reference, field.cast)
                )
            }
            Self::IsNull { field } => format!("{} IS NULL", field.to_sql()),
            Self::In { field, values } => {
                let reference = bind(values.clone());
                format!("{} IN {reference}", field.to_sql())
            }
            Self::All(items) => render_group(items, " AND ", bind),
            Self::Any(items) => render_group(items, " OR ", bind),
        }
    }

    /// Render with a fresh `@P_<n>_` allocator.
    #[must_use]
    pub fn to_sql_with_params(&self) -> (String, ParamMap) {
        let mut allocator = ParamAllocator::new();
        let sql = self.to_sql(&mut |value| allocator.bind(value));
        (sql, allocator.into_params())
    }

    /// Evaluate against one JSON row. SQL null semantics apply: comparisons with a missing or
    /// null cell are false.
    #[must_use]
    pub fn matches(&self, row: &Map<String, JsonValue>) -> bool {
        match self {
            Self::Eq { field, value } => lookup(row, &field.path)
                .is_some_and(|cell| compare(cell, value, field.cast) == Some(Ordering::Equal)),
            Self::Like { field, needle } => lookup(row, &field.path)
                .and_then(json_text)
                .is_some_and(|text| contains_ignore_case(&text, needle)),
            Self::Range { field, op, value } => lookup(row, &field.path)
                .and_then(|cell| compare(cell, value, field.cast))
                .is_some_and(|ordering| op.accepts(ordering)),
            Self::IsNull { field } => lookup(row, &field.path).is_none_or(JsonValue::is_null),
            Self::In { field, values } => lookup(row, &field.path).is_some_and(|cell| {
                list_members(values)
                    .iter()
                    .any(|member| compare(cell, member, field.cast) == Some(Ordering::Equal))
            }),
            Self::All(items) => items.iter().all(|p| p.matches(row)),
            Self::Any(items) => items.iter().any(|p| p.matches(row)),
        }
    }
}

fn param_sql(reference: &str, cast: Cast) -> String {
    match cast {
        Cast::Date => cast_sql(reference, Cast::Date),
        Cast::None | Cast::Text => reference.to_string(),
    }
}

fn render_group<F>(items: &[Predicate], separator: &str, bind: &mut F) -> String
where
    F: FnMut(ParamValue) -> String,
{
    let parts: Vec<String> = items
        .iter()
        .map(|p| p.to_sql(bind))
        .filter(|sql| !sql.is_empty())
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(separator))
    }
}

/// Follow a dotted path through nested objects.
pub(crate) fn lookup<'a>(row: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = row.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn json_text(cell: &JsonValue) -> Option<String> {
    match cell {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn param_text(value: &ParamValue) -> Option<String> {
    match value {
        ParamValue::Null | ParamValue::IntList(_) | ParamValue::TextList(_) => None,
        ParamValue::Bool(b) => Some(b.to_string()),
        ParamValue::Int(i) => Some(i.to_string()),
        ParamValue::Float(f) => Some(f.to_string()),
        ParamValue::Decimal(d) => Some(d.to_string()),
        ParamValue::Text(s) => Some(s.clone()),
        ParamValue::Uuid(u) => Some(u.to_string()),
        ParamValue::Date(d) => Some(d.to_string()),
        ParamValue::DateTime(dt) => Some(dt.to_rfc3339()),
    }
}

fn list_members(values: &ParamValue) -> Vec<ParamValue> {
    match values {
        ParamValue::IntList(items) => items.iter().copied().map(ParamValue::Int).collect(),
        ParamValue::TextList(items) => items.iter().cloned().map(ParamValue::Text).collect(),
        other => vec![other.clone()],
    }
}

fn cell_f64(cell: &JsonValue) -> Option<f64> {
    match cell {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_date(cell: &JsonValue) -> Option<NaiveDate> {
    let text = json_text(cell)?;
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

fn cell_datetime(cell: &JsonValue) -> Option<DateTime<Utc>> {
    let text = json_text(cell)?;
    DateTime::parse_from_rfc3339(&text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn param_date(value: &ParamValue) -> Option<NaiveDate> {
    match value {
        ParamValue::Date(d) => Some(*d),
        ParamValue::DateTime(dt) => Some(dt.date_naive()),
        ParamValue::Text(s) => NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn compare(cell: &JsonValue, value: &ParamValue, cast: Cast) -> Option<Ordering> {
    match cast {
        Cast::Date => Some(cell_date(cell)?.cmp(&param_date(value)?)),
        Cast::Text => Some(json_text(cell)?.cmp(&param_text(value)?)),
        Cast::None => match value {
            ParamValue::Null | ParamValue::IntList(_) | ParamValue::TextList(_) => None,
            ParamValue::Bool(b) => cell.as_bool().map(|c| c.cmp(b)),
            ParamValue::Int(i) => match cell.as_i64() {
                Some(c) => Some(c.cmp(i)),
                None => cell_f64(cell)?.partial_cmp(&i.to_f64()?),
            },
            ParamValue::Float(f) => cell_f64(cell)?.partial_cmp(f),
            ParamValue::Decimal(d) => cell_f64(cell)?.partial_cmp(&d.to_f64()?),
            ParamValue::Text(s) => Some(json_text(cell)?.as_str().cmp(s.as_str())),
            ParamValue::Uuid(u) => Some(json_text(cell)?.to_ascii_lowercase().cmp(&u.to_string())),
            ParamValue::Date(d) => Some(cell_date(cell)?.cmp(d)),
            ParamValue::DateTime(dt) => Some(cell_datetime(cell)?.cmp(dt)),
        },
    }
}
