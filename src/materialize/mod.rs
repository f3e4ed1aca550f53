//! # Row Materialization
//!
//! Two interchangeable strategies turn a query into JSON text:
//!
//! - [`DatabaseJson`] lets Postgres aggregate the rows (`row_to_json` / `array_agg`) and reads
//!   back one text scalar. This is the default.
//! - [`StreamingJson`] reads typed rows and encodes them in process, column by column in
//!   result-set order. Use it where database-side aggregation is unavailable.
//!
//! Both produce the same bytes: same key order, `null` for missing values, `[]` for an empty
//! array and `{}` for a missing single object. Custom projections (aliases, aggregates, joined
//! columns) are encoded too; the entity's fields only serve as decoding hints.

mod database;
mod streaming;

pub use database::{DatabaseJson, JSON_COLUMN};
pub use streaming::{Cell, StreamingJson, decode_row, encode_row, encode_rows};

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};

use crate::core::EntityDef;
use crate::query::{OutputMode, ParamMap};

/// One statement to render, with the shape of JSON expected back.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Unwrapped query text with named parameters
    pub sql: &'a str,
    pub params: &'a ParamMap,
    /// `JsonArray` or `JsonObject`; `RawRows` renders as an array
    pub shape: OutputMode,
    /// Decoding hints for in-process encoding
    pub entity: &'a EntityDef,
}

/// Strategy for rendering a result set as JSON text.
#[async_trait]
pub trait RowMaterializer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn materialize(
        &self,
        db: &DatabaseConnection,
        request: RenderRequest<'_>,
    ) -> Result<String, DbErr>;
}

/// JSON emitted when there is nothing to render.
#[must_use]
pub const fn empty_json(shape: OutputMode) -> &'static str {
    match shape {
        OutputMode::JsonObject => "{}",
        OutputMode::JsonArray | OutputMode::RawRows => "[]",
    }
}

const fn json_shape(shape: OutputMode) -> OutputMode {
    match shape {
        OutputMode::JsonObject => OutputMode::JsonObject,
        OutputMode::JsonArray | OutputMode::RawRows => OutputMode::JsonArray,
    }
}
