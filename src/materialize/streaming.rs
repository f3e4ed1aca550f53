use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, QueryResult, TryGetError, TryGetable};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use uuid::Uuid;

use super::{RenderRequest, RowMaterializer, empty_json, json_shape};
use crate::core::{EntityDef, FieldType};
use crate::query::{OutputMode, bind};

/// In-process encoding of typed rows, column by column in result-set order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingJson;

#[async_trait]
impl RowMaterializer for StreamingJson {
    fn name(&self) -> &'static str {
        "streaming_json"
    }

    async fn materialize(
        &self,
        db: &DatabaseConnection,
        request: RenderRequest<'_>,
    ) -> Result<String, DbErr> {
        let statement = bind(request.sql, request.params, db.get_database_backend());
        let rows = db.query_all(statement).await?;

        match json_shape(request.shape) {
            OutputMode::JsonObject => match rows.first() {
                Some(row) => {
                    let mut out = String::new();
                    encode_row(&mut out, &decode_row(row, request.entity)?);
                    Ok(out)
                }
                None => Ok(empty_json(OutputMode::JsonObject).to_string()),
            },
            _ => {
                let decoded = rows
                    .iter()
                    .map(|row| decode_row(row, request.entity))
                    .collect::<Result<Vec<_>, DbErr>>()?;
                Ok(encode_rows(&decoded))
            }
        }
    }
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    /// `timestamp` (no time zone)
    Timestamp(NaiveDateTime),
    /// `timestamptz`, normalised to UTC
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Json(JsonValue),
    List(Vec<Cell>),
}

fn get<T: TryGetable>(row: &QueryResult, column: &str) -> Result<Option<T>, DbErr> {
    row.try_get::<Option<T>>("", column)
}

fn take<T: TryGetable>(row: &QueryResult, column: &str) -> Result<T, TryGetError> {
    row.try_get_by_nullable::<T, _>(column)
}

fn list<T>(items: Vec<T>, cell: impl Fn(T) -> Cell) -> Cell {
    Cell::List(items.into_iter().map(cell).collect())
}

/// `real` values keep their short form (`0.1`, not `0.10000000149011612`).
fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or_else(|_| f64::from(value))
}

/// Decode a declared column by its type. `None` for NULL, or when the declared type does not
/// fit the column at all.
fn decode_declared(
    row: &QueryResult,
    column: &str,
    field_type: FieldType,
) -> Result<Option<Cell>, DbErr> {
    Ok(match field_type {
        FieldType::Text => get::<String>(row, column)?.map(Cell::Text),
        FieldType::Integer => get::<i32>(row, column)?.map(|v| Cell::Int(v.into())),
        FieldType::BigInteger => get::<i64>(row, column)?.map(Cell::Int),
        FieldType::Float => get::<f64>(row, column)?.map(Cell::Float),
        FieldType::Decimal => get::<Decimal>(row, column)?.map(Cell::Decimal),
        FieldType::Boolean => get::<bool>(row, column)?.map(Cell::Bool),
        FieldType::Date => get::<NaiveDate>(row, column)?.map(Cell::Date),
        FieldType::DateTime => get::<DateTime<Utc>>(row, column)?.map(Cell::DateTime),
        FieldType::Uuid => get::<Uuid>(row, column)?.map(Cell::Uuid),
        FieldType::Json => get::<JsonValue>(row, column)?.map(Cell::Json),
        FieldType::TextList => get::<Vec<String>>(row, column)?.map(|v| list(v, Cell::Text)),
        FieldType::IntegerList => {
            get::<Vec<i32>>(row, column)?.map(|v| list(v, |i| Cell::Int(i.into())))
        }
        FieldType::Relation { .. } | FieldType::Collection { .. } | FieldType::Storage => None,
    })
}

type Decoder = fn(&QueryResult, &str) -> Result<Cell, TryGetError>;

/// Decoders tried, in order, for columns the entity does not declare.
const FALLBACK_DECODERS: &[Decoder] = &[
    |row: &QueryResult, c: &str| take::<bool>(row, c).map(Cell::Bool),
    |row: &QueryResult, c: &str| take::<i32>(row, c).map(|v| Cell::Int(v.into())),
    |row: &QueryResult, c: &str| take::<i64>(row, c).map(Cell::Int),
    |row: &QueryResult, c: &str| take::<i16>(row, c).map(|v| Cell::Int(v.into())),
    |row: &QueryResult, c: &str| take::<f64>(row, c).map(Cell::Float),
    |row: &QueryResult, c: &str| take::<f32>(row, c).map(|v| Cell::Float(widen(v))),
    |row: &QueryResult, c: &str| take::<Decimal>(row, c).map(Cell::Decimal),
    |row: &QueryResult, c: &str| take::<String>(row, c).map(Cell::Text),
    |row: &QueryResult, c: &str| take::<Uuid>(row, c).map(Cell::Uuid),
    |row: &QueryResult, c: &str| take::<NaiveDate>(row, c).map(Cell::Date),
    |row: &QueryResult, c: &str| take::<DateTime<Utc>>(row, c).map(Cell::DateTime),
    |row: &QueryResult, c: &str| take::<NaiveDateTime>(row, c).map(Cell::Timestamp),
    |row: &QueryResult, c: &str| take::<JsonValue>(row, c).map(Cell::Json),
    |row: &QueryResult, c: &str| take::<Vec<String>>(row, c).map(|v| list(v, Cell::Text)),
    |row: &QueryResult, c: &str| {
        take::<Vec<i32>>(row, c).map(|v| list(v, |i| Cell::Int(i.into())))
    },
    |row: &QueryResult, c: &str| take::<Vec<i64>>(row, c).map(|v| list(v, Cell::Int)),
];

/// Decode a column of unknown type by trying the common Postgres types.
///
/// A column no decoder accepts is an error unless some decoder reported NULL.
fn decode_untyped(row: &QueryResult, column: &str) -> Result<Cell, DbErr> {
    let mut saw_null = false;
    let mut mismatch = None;
    for decoder in FALLBACK_DECODERS {
        match decoder(row, column) {
            Ok(cell) => return Ok(cell),
            Err(TryGetError::Null(_)) => saw_null = true,
            Err(TryGetError::DbErr(err)) => mismatch = Some(err),
        }
    }
    match mismatch {
        Some(err) if !saw_null => Err(DbErr::Type(format!(
            "column `{column}` has no JSON encoding: {err}"
        ))),
        _ => Ok(Cell::Null),
    }
}

/// Decode every column of one row, in result-set order, the way `row_to_json` sees it.
///
/// Columns the entity declares decode by their declared type; aliases, aggregates and joined
/// columns are decoded by trying the common types in turn.
pub fn decode_row(row: &QueryResult, entity: &EntityDef) -> Result<Vec<(String, Cell)>, DbErr> {
    row.column_names()
        .into_iter()
        .map(|column| {
            let declared = entity
                .find_scalar(&column)
                .and_then(|field| decode_declared(row, &column, field.field_type).ok().flatten());
            let cell = match declared {
                Some(cell) => cell,
                None => decode_untyped(row, &column)?,
            };
            Ok((column, cell))
        })
        .collect()
}

/// Encode rows as a JSON array; `[]` when empty.
#[must_use]
pub fn encode_rows<S: AsRef<str>>(rows: &[Vec<(S, Cell)>]) -> String {
    let mut out = String::from("[");
    for (index, row) in rows.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        encode_row(&mut out, row);
    }
    out.push(']');
    out
}

/// Append one row as a JSON object.
pub fn encode_row<S: AsRef<str>>(out: &mut String, cells: &[(S, Cell)]) {
    out.push('{');
    for (index, (name, cell)) in cells.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        push_json_string(out, name.as_ref());
        out.push(':');
        encode_cell(out, cell);
    }
    out.push('}');
}

fn encode_cell(out: &mut String, cell: &Cell) {
    match cell {
        Cell::Null => out.push_str("null"),
        Cell::Text(text) => encode_text(out, text),
        Cell::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Cell::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Cell::Float(f) if f.is_finite() => {
            let _ = write!(out, "{f}");
        }
        Cell::Float(f) => push_json_string(out, non_finite_text(*f)),
        // `Decimal` always renders with `.`, whatever the locale
        Cell::Decimal(d) => out.push_str(&d.to_string()),
        Cell::Date(d) => push_json_string(out, &d.format("%Y-%m-%d").to_string()),
        Cell::Timestamp(ts) => push_json_string(out, &timestamp_text(ts)),
        Cell::DateTime(dt) => push_json_string(out, &utc_text(dt)),
        Cell::Uuid(u) => push_json_string(out, &u.to_string()),
        Cell::Json(value) => out.push_str(&value.to_string()),
        Cell::List(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                encode_cell(out, item);
            }
            out.push(']');
        }
    }
}

/// ISO 8601 with microsecond precision and trailing zeros trimmed, the way Postgres prints
/// `timestamp`.
fn timestamp_text(ts: &NaiveDateTime) -> String {
    let mut text = ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = ts.nanosecond() / 1_000;
    if micros > 0 {
        let fraction = format!("{micros:06}");
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

/// `timestamptz` as Postgres prints it in UTC.
fn utc_text(dt: &DateTime<Utc>) -> String {
    let mut text = timestamp_text(&dt.naive_utc());
    text.push_str("+00:00");
    text
}

/// Postgres spelling of the float values JSON numbers cannot hold.
fn non_finite_text(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

/// Text that already holds a JSON object or array is spliced in as is.
fn encode_text(out: &mut String, text: &str) {
    let trimmed = text.trim();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde::de::IgnoredAny>(trimmed).is_ok()
    {
        out.push_str(trimmed);
    } else {
        push_json_string(out, text);
    }
}

fn push_json_string(out: &mut String, text: &str) {
    out.push_str(&JsonValue::String(text.to_string()).to_string());
}
