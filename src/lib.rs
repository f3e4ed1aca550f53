//! # querycrate
//!
//! Turns HTTP query-string parameters (`filter_by`, `order_by`, `page`, `take`) into scoped,
//! parameterized Postgres queries and renders their results as JSON, so one generic handler can
//! serve any registered entity.
//!
//! ```rust,ignore
//! use axum::{Router, extract::{Query, State}, routing::get};
//! use querycrate::{ApiError, ListQuery, QueryEngine, QueryOutput, StaticPrincipal};
//!
//! async fn list_orders(
//!     State(state): State<AppState>,
//!     Query(query): Query<ListQuery>,
//! ) -> Result<QueryOutput, ApiError> {
//!     let principal = StaticPrincipal::authenticated().with_claim("company_id", 7);
//!     state.engine.list::<Order, _>(&state.db, &query, &principal).await
//! }
//!
//! let app = Router::new().route("/orders", get(list_orders)).with_state(state);
//! ```
//!
//! ## Pieces
//!
//! - [`filtering`]: the `filter_by` grammar, value coercion, `order_by` and tenant scoping
//! - [`query`]: plan assembly and named-to-positional parameter binding
//! - [`database`]: the engine, concurrent count + data execution and the row-count cache
//! - [`materialize`]: database-side or in-process JSON rendering
//! - [`memory`]: the same semantics over rows already in memory

pub mod config;
pub mod core;
pub mod database;
pub mod errors;
pub mod filtering;
pub mod materialize;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod query;

pub use config::{EngineConfig, ScopeConfig};
pub use crate::core::{EntityDef, FieldDef, FieldType, QueryResource, SchemaRegistry};
pub use database::{CountCache, PreparedQuery, QueryEngine, QueryOutput, RowCountCache};
pub use errors::{ApiError, FilterWarning, WarningKind};
pub use filtering::{CompiledFilter, Principal, StaticPrincipal, compile_filter};
pub use materialize::{DatabaseJson, RowMaterializer, StreamingJson};
pub use memory::{MemoryOutput, MemoryQuery};
pub use models::ListQuery;
pub use pagination::{PageMeta, PageRequest, PagedResult};
pub use query::{InsertionPoint, OutputMode, ParamMap, ParamValue, QueryPlan};
pub use serde_with;
