//! Type-directed coercion of one `field<op>value` token into a [`Predicate`].
//!
//! With a known property type the type decides; without one (schema-less in-memory data) the
//! value is tried in order: `null`, integer, float, boolean, date, then plain text.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::ast::{Cast, Operand, Predicate, RangeOp};
use super::grammar::FilterOp;
use crate::core::FieldType;
use crate::errors::WarningKind;
use crate::query::ParamValue;

const LIST_SEPARATOR: char = ';';

/// Coerce one token. `Err` means the token contributes nothing.
pub fn coerce(
    field_type: Option<FieldType>,
    path: &str,
    op: FilterOp,
    raw: &str,
) -> Result<Predicate, WarningKind> {
    if op == FilterOp::Eq && raw.contains(LIST_SEPARATOR) {
        return membership(field_type, path, raw);
    }
    if op == FilterOp::Contains {
        let cast = if field_type.is_some_and(FieldType::is_textual) {
            Cast::None
        } else {
            Cast::Text
        };
        return Ok(Predicate::Like {
            field: Operand::cast(path, cast),
            needle: raw.to_string(),
        });
    }
    if raw.eq_ignore_ascii_case("null") {
        return match op {
            FilterOp::Eq => Ok(Predicate::IsNull {
                field: Operand::column(path),
            }),
            _ => Err(WarningKind::UnsupportedOperator),
        };
    }

    match field_type {
        Some(FieldType::Text) => Ok(match RangeOp::from_filter_op(op) {
            Some(range) => compare(Operand::column(path), range, ParamValue::Text(raw.to_string())),
            None => Predicate::Like {
                field: Operand::column(path),
                needle: raw.to_string(),
            },
        }),
        Some(FieldType::Integer | FieldType::BigInteger) => {
            let value = raw.parse::<i64>().map_err(|_| WarningKind::UnparseableValue)?;
            Ok(typed(Operand::column(path), op, ParamValue::Int(value)))
        }
        Some(FieldType::Float) => {
            let value = parse_float(raw).ok_or(WarningKind::UnparseableValue)?;
            Ok(typed(Operand::column(path), op, ParamValue::Float(value)))
        }
        Some(FieldType::Decimal) => {
            let value = raw.parse::<Decimal>().map_err(|_| WarningKind::UnparseableValue)?;
            Ok(typed(Operand::column(path), op, ParamValue::Decimal(value)))
        }
        Some(FieldType::Boolean) => {
            if op.is_range() {
                return Err(WarningKind::UnsupportedOperator);
            }
            let value = parse_bool(raw).ok_or(WarningKind::UnparseableValue)?;
            Ok(typed(Operand::column(path), op, ParamValue::Bool(value)))
        }
        Some(FieldType::Date | FieldType::DateTime) => {
            let value = parse_date(raw).ok_or(WarningKind::UnparseableValue)?;
            Ok(typed(Operand::cast(path, Cast::Date), op, ParamValue::Date(value)))
        }
        Some(FieldType::Uuid) => {
            if op.is_range() {
                return Err(WarningKind::UnsupportedOperator);
            }
            let value = Uuid::parse_str(raw).map_err(|_| WarningKind::UnparseableValue)?;
            Ok(typed(Operand::column(path), op, ParamValue::Uuid(value)))
        }
        Some(FieldType::Json | FieldType::TextList | FieldType::IntegerList) => {
            if op.is_range() {
                return Err(WarningKind::UnsupportedOperator);
            }
            Ok(Predicate::Like {
                field: Operand::cast(path, Cast::Text),
                needle: raw.to_string(),
            })
        }
        Some(FieldType::Relation { .. } | FieldType::Collection { .. } | FieldType::Storage) => {
            Err(WarningKind::UnknownField)
        }
        None => Ok(infer(path, op, raw)),
    }
}

/// `field=a;b;c` as set membership.
fn membership(
    field_type: Option<FieldType>,
    path: &str,
    raw: &str,
) -> Result<Predicate, WarningKind> {
    let members: Vec<&str> = raw
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect();
    if members.is_empty() {
        return Err(WarningKind::UnparseableValue);
    }
    let integers: Option<Vec<i64>> = members.iter().map(|m| m.parse().ok()).collect();
    let texts = || ParamValue::TextList(members.iter().map(|m| (*m).to_string()).collect());

    let (operand, values) = match field_type {
        Some(FieldType::Integer | FieldType::BigInteger) => (
            Operand::column(path),
            ParamValue::IntList(integers.ok_or(WarningKind::UnparseableValue)?),
        ),
        Some(FieldType::Text) => (Operand::column(path), texts()),
        Some(kind) => match integers {
            Some(values) if kind.is_numeric() => {
                (Operand::column(path), ParamValue::IntList(values))
            }
            _ => (Operand::cast(path, Cast::Text), texts()),
        },
        None => match integers {
            Some(values) => (Operand::column(path), ParamValue::IntList(values)),
            None => (Operand::column(path), texts()),
        },
    };
    Ok(Predicate::In {
        field: operand,
        values,
    })
}

/// Value probing for properties of unknown type.
fn infer(path: &str, op: FilterOp, raw: &str) -> Predicate {
    if let Ok(value) = raw.parse::<i64>() {
        return typed(Operand::column(path), op, ParamValue::Int(value));
    }
    if let Some(value) = parse_float(raw) {
        return typed(Operand::column(path), op, ParamValue::Float(value));
    }
    if !op.is_range()
        && let Some(value) = parse_bool(raw)
    {
        return typed(Operand::column(path), op, ParamValue::Bool(value));
    }
    if let Some(value) = parse_date(raw) {
        return typed(Operand::cast(path, Cast::Date), op, ParamValue::Date(value));
    }
    typed(Operand::cast(path, Cast::Text), op, ParamValue::Text(raw.to_string()))
}

/// Broadcast one operator/value pair across several properties, OR-combined.
///
/// `=` and `¬` become a contains match on every property; range operators keep only the
/// properties whose type accepts the value. Returns `None` when nothing applies.
pub fn broadcast<'a, I>(fields: I, op: FilterOp, raw: &str) -> Option<Predicate>
where
    I: IntoIterator<Item = (&'a str, Option<FieldType>)>,
{
    let predicates: Vec<Predicate> = fields
        .into_iter()
        .filter_map(|(path, field_type)| {
            if op.is_range() {
                coerce(field_type, path, op, raw).ok()
            } else {
                coerce(field_type, path, FilterOp::Contains, raw).ok()
            }
        })
        .collect();
    (!predicates.is_empty()).then_some(Predicate::Any(predicates))
}

fn typed(field: Operand, op: FilterOp, value: ParamValue) -> Predicate {
    match RangeOp::from_filter_op(op) {
        Some(range) => compare(field, range, value),
        None => Predicate::Eq { field, value },
    }
}

fn compare(field: Operand, op: RangeOp, value: ParamValue) -> Predicate {
    Predicate::Range { field, op, value }
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" => Some(true),
        "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

/// Day-precision date from `2024-03-05`, `2024-03-05T10:00:00` or an RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}
