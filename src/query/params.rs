//! Named parameters and their binding to positional driver values.
//!
//! Query text is assembled with named references (`@P_0_`, `@ScopeValue`, `@PageSize`).
//! [`bind`] turns the text into a sea-orm [`Statement`] right before execution:
//!
//! - each distinct name becomes one positional value (`$1`, `$2`, ... on Postgres),
//! - `IN @list` becomes `= ANY($n)` and `NOT IN @list` becomes `<> ALL($n)` for list values,
//! - references inside string literals and names that are not in the map are left untouched,
//!   so operators such as `@>` survive.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbBackend, Statement, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A coerced value bound into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl ParamValue {
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::IntList(_) | Self::TextList(_))
    }

    /// Driver value for this parameter.
    #[must_use]
    pub fn to_db_value(&self) -> Value {
        match self {
            Self::Null => Option::<String>::None.into(),
            Self::Bool(b) => (*b).into(),
            Self::Int(i) => (*i).into(),
            Self::Float(f) => (*f).into(),
            Self::Decimal(d) => (*d).into(),
            Self::Text(s) => s.clone().into(),
            Self::Uuid(u) => (*u).into(),
            Self::Date(d) => (*d).into(),
            Self::DateTime(dt) => (*dt).into(),
            Self::IntList(items) => items.clone().into(),
            Self::TextList(items) => items.clone().into(),
        }
    }

    /// List members as individual driver values, for backends without array binding.
    fn list_members(&self) -> Vec<Value> {
        match self {
            Self::IntList(items) => items.iter().map(|i| Value::from(*i)).collect(),
            Self::TextList(items) => items.iter().map(|s| Value::from(s.clone())).collect(),
            other => vec![other.to_db_value()],
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for ParamValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Parameters keyed by bare name (without the leading `@`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    values: BTreeMap<String, ParamValue>,
}

impl ParamMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let name = name.strip_prefix('@').map(str::to_string).unwrap_or(name);
        self.values.insert(name, value.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name.strip_prefix('@').unwrap_or(name))
    }

    pub fn extend(&mut self, other: ParamMap) {
        self.values.extend(other.values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// `@name` reference for a bare parameter name.
#[must_use]
pub fn param_ref(name: &str) -> String {
    format!("@{name}")
}

/// Rewrite named references to positional placeholders and collect the values.
#[must_use]
pub fn bind(sql: &str, params: &ParamMap, backend: DbBackend) -> Statement {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut values: Vec<Value> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut in_literal = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
        }
        if in_literal || c != '@' {
            out.push(c);
            continue;
        }

        let start = index + 1;
        let mut end = start;
        while let Some(&(next_index, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = next_index + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let name = &sql[start..end];
        let Some(value) = params.get(name).filter(|_| starts_identifier(name)) else {
            out.push('@');
            out.push_str(name);
            continue;
        };

        let membership = if value.is_list() {
            strip_trailing_membership(&mut out)
        } else {
            None
        };

        if backend == DbBackend::Postgres {
            let position = *positions.entry(name).or_insert_with(|| {
                values.push(value.to_db_value());
                values.len()
            });
            match membership {
                Some(Membership::In) => out.push_str(&format!("= ANY(${position})")),
                Some(Membership::NotIn) => out.push_str(&format!("<> ALL(${position})")),
                None => out.push_str(&format!("${position}")),
            }
        } else if let Some(membership) = membership {
            let members = value.list_members();
            let placeholders = vec!["?"; members.len().max(1)].join(", ");
            if members.is_empty() {
                values.push(Option::<String>::None.into());
            } else {
                values.extend(members);
            }
            let keyword = match membership {
                Membership::In => "IN",
                Membership::NotIn => "NOT IN",
            };
            out.push_str(&format!("{keyword} ({placeholders})"));
        } else {
            // `?` placeholders are strictly positional: repeat the value per occurrence
            values.push(value.to_db_value());
            out.push('?');
        }
    }

    Statement::from_sql_and_values(backend, out, values)
}

fn starts_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    In,
    NotIn,
}

/// Remove a trailing `IN` / `NOT IN` keyword from `out`, reporting which one it was.
fn strip_trailing_membership(out: &mut String) -> Option<Membership> {
    let head_len = out.trim_end().len();
    if !ends_with_keyword(&out[..head_len], "in") {
        return None;
    }
    let without_in = out[..head_len - 2].trim_end().len();
    if ends_with_keyword(&out[..without_in], "not") {
        out.truncate(without_in - 3);
        Some(Membership::NotIn)
    } else {
        out.truncate(head_len - 2);
        Some(Membership::In)
    }
}

fn ends_with_keyword(text: &str, keyword: &str) -> bool {
    let Some(split) = text.len().checked_sub(keyword.len()) else {
        return false;
    };
    let (Some(before), Some(tail)) = (text.get(..split), text.get(split..)) else {
        return false;
    };
    tail.eq_ignore_ascii_case(keyword)
        && before
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == ')')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(stmt: &Statement) -> Vec<Value> {
        stmt.values.clone().map(|v| v.0).unwrap_or_default()
    }

    #[test]
    fn test_named_to_positional() {
        let params = ParamMap::new().with("P_0_", 100_i64).with("P_1_", "foo");
        let stmt = bind(
            "SELECT * FROM t WHERE (price >= @P_0_ AND name ILIKE @P_1_)",
            &params,
            DbBackend::Postgres,
        );
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE (price >= $1 AND name ILIKE $2)");
        assert_eq!(values(&stmt), vec![Value::from(100_i64), Value::from("foo".to_string())]);
    }

    #[test]
    fn test_repeated_name_reuses_position() {
        let params = ParamMap::new().with("ScopeValue", 7_i64);
        let stmt = bind(
            "SELECT a FROM t WHERE a = @ScopeValue OR b = @ScopeValue",
            &params,
            DbBackend::Postgres,
        );
        assert_eq!(stmt.sql, "SELECT a FROM t WHERE a = $1 OR b = $1");
        assert_eq!(values(&stmt).len(), 1);
    }

    #[test]
    fn test_in_list_becomes_any() {
        let params = ParamMap::new().with("P_0_", ParamValue::IntList(vec![1, 2, 3]));
        let stmt = bind("SELECT a FROM t WHERE status IN @P_0_", &params, DbBackend::Postgres);
        assert_eq!(stmt.sql, "SELECT a FROM t WHERE status = ANY($1)");
        assert_eq!(values(&stmt), vec![Value::from(vec![1_i64, 2, 3])]);
    }

    #[test]
    fn test_not_in_list_becomes_all() {
        let params = ParamMap::new().with("P_0_", ParamValue::TextList(vec!["a".into()]));
        let stmt = bind("SELECT a FROM t WHERE code NOT IN @P_0_", &params, DbBackend::Postgres);
        assert_eq!(stmt.sql, "SELECT a FROM t WHERE code <> ALL($1)");
    }

    #[test]
    fn test_in_expands_for_positional_backends() {
        let params = ParamMap::new().with("P_0_", ParamValue::IntList(vec![4, 5]));
        let stmt = bind("SELECT a FROM t WHERE status IN @P_0_", &params, DbBackend::Sqlite);
        assert_eq!(stmt.sql, "SELECT a FROM t WHERE status IN (?, ?)");
        assert_eq!(values(&stmt), vec![Value::from(4_i64), Value::from(5_i64)]);
    }

    #[test]
    fn test_literals_and_unknown_names_untouched() {
        let params = ParamMap::new().with("P_0_", 1_i64);
        let stmt = bind(
            "SELECT '@P_0_' AS x FROM t WHERE tags @> @Other AND id = @P_0_",
            &params,
            DbBackend::Postgres,
        );
        assert_eq!(stmt.sql, "SELECT '@P_0_' AS x FROM t WHERE tags @> @Other AND id = $1");
    }

    #[test]
    fn test_identifier_ending_in_in_is_not_membership() {
        let params = ParamMap::new().with("P_0_", ParamValue::IntList(vec![1]));
        let stmt = bind("SELECT a FROM t WHERE origin@P_0_", &params, DbBackend::Postgres);
        assert_eq!(stmt.sql, "SELECT a FROM t WHERE origin$1");
    }

    #[test]
    fn test_param_map_accepts_prefixed_names() {
        let params = ParamMap::new().with("@PageSize", 10_i64);
        assert_eq!(params.get("PageSize"), Some(&ParamValue::Int(10)));
        assert_eq!(params.get("@PageSize"), Some(&ParamValue::Int(10)));
    }
}
