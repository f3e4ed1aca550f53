//! Query execution.
//!
//! [`QueryEngine`] compiles a listing request into a [`QueryPlan`], runs the data query and the
//! count query concurrently and combines them into one JSON body. Every statement runs under the
//! configured command timeout; failures are logged here, once, and returned as [`ApiError`].

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::try_join;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, QueryResult};
use std::{future::Future, sync::Arc};

use super::cache::{CountCache, RowCountCache};
use crate::config::EngineConfig;
use crate::core::{EntityDef, QueryResource, SchemaRegistry};
use crate::errors::{ApiError, FilterWarning};
use crate::filtering::{Principal, compile_filter, parse_order_by, resolve_scope};
use crate::materialize::{DatabaseJson, RenderRequest, RowMaterializer};
use crate::models::ListQuery;
use crate::pagination::{PageMeta, PageRequest, PageWindow, envelope_json, warnings_header};
use crate::query::{OutputMode, ParamMap, QueryPlan, bind};

/// Column the count query selects into.
pub const COUNT_COLUMN: &str = "count";

/// A compiled request, ready to execute.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub entity: EntityDef,
    pub plan: QueryPlan,
    /// `None` returns the whole result set without an envelope
    pub page: Option<PageRequest>,
    pub warnings: Vec<FilterWarning>,
}

impl PreparedQuery {
    /// Wrap a hand-assembled plan, e.g. one using a non-default insertion point.
    #[must_use]
    pub fn new(entity: EntityDef, plan: QueryPlan) -> Self {
        Self {
            entity,
            plan,
            page: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }
}

/// The rendered JSON body plus whatever was degraded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub body: String,
    pub warnings: Vec<FilterWarning>,
    /// Present when the request was paginated
    pub meta: Option<PageMeta>,
}

impl QueryOutput {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Parse the body, mostly useful in tests.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

impl IntoResponse for QueryOutput {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            warnings_header(&self.warnings),
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

pub struct QueryEngine {
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
    cache: Arc<dyn CountCache>,
    materializer: Arc<dyn RowMaterializer>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("entities", &self.registry.len())
            .field("config", &self.config)
            .field("materializer", &self.materializer.name())
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Engine with an in-process row-count cache and database-side JSON rendering.
    #[must_use]
    pub fn new(registry: SchemaRegistry, config: EngineConfig) -> Self {
        let cache = Arc::new(RowCountCache::from_config(&config));
        Self {
            registry: Arc::new(registry),
            config,
            cache,
            materializer: Arc::new(DatabaseJson),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CountCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_materializer(mut self, materializer: impl RowMaterializer + 'static) -> Self {
        self.materializer = Arc::new(materializer);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &dyn CountCache {
        self.cache.as_ref()
    }

    /// Drop the cached total of `R`; call after creating or deleting rows.
    pub fn invalidate_count<R: QueryResource>(&self) {
        self.cache.invalidate(R::RESOURCE_NAME);
    }

    /// The registered definition of `R`, or the one it describes itself.
    #[must_use]
    pub fn entity<R: QueryResource>(&self) -> EntityDef {
        self.registry
            .get(R::RESOURCE_NAME)
            .cloned()
            .unwrap_or_else(R::entity_def)
    }

    /// Compile filter, scope and sort into a plan for `R`.
    pub fn prepare<R, P>(&self, query: &ListQuery, principal: &P) -> PreparedQuery
    where
        R: QueryResource,
        P: Principal + ?Sized,
    {
        let entity = self.entity::<R>();
        let mut plan = QueryPlan::new(R::base_query()).output(OutputMode::JsonArray);
        if let Some(group_by) = R::group_by() {
            plan = plan.group_by(group_by);
        }
        let mut warnings = Vec::new();

        if let Some(expression) = query.filter() {
            let compiled = compile_filter(&entity, expression);
            plan.push_predicate(&compiled.fragment, compiled.params);
            warnings.extend(compiled.warnings);
        }

        if let Some(scope) = &self.config.scope
            && let Some(resolved) = resolve_scope(&self.registry, &entity, scope, principal)
        {
            let (fragment, params) = resolved.to_sql();
            plan.push_predicate(&fragment, params);
        }

        let order = match query.order() {
            Some(order_by) => {
                let sort = parse_order_by(&entity, order_by, self.config.join_prefix.as_deref());
                warnings.extend(sort.warnings.iter().cloned());
                sort.to_sql()
            }
            None => None,
        };
        if let Some(order) = order.or_else(R::default_order) {
            plan = plan.order_by(order);
        }

        PreparedQuery {
            page: query.page_request(self.config.default_page_size),
            entity,
            plan,
            warnings,
        }
    }

    /// List `R` as a JSON array, or as a pagination envelope when `page` is present.
    pub async fn list<R, P>(
        &self,
        db: &DatabaseConnection,
        query: &ListQuery,
        principal: &P,
    ) -> Result<QueryOutput, ApiError>
    where
        R: QueryResource,
        P: Principal + ?Sized,
    {
        let prepared = self.prepare::<R, P>(query, principal);
        self.execute(db, prepared).await
    }

    /// The first matching row of `R` as a JSON object, `{}` when nothing matches.
    pub async fn one<R, P>(
        &self,
        db: &DatabaseConnection,
        query: &ListQuery,
        principal: &P,
    ) -> Result<QueryOutput, ApiError>
    where
        R: QueryResource,
        P: Principal + ?Sized,
    {
        let PreparedQuery {
            entity,
            plan,
            warnings,
            ..
        } = self.prepare::<R, P>(query, principal);
        let (sql, params) = plan.render_page(PageWindow {
            page_size: 1,
            offset: 0,
        });
        let body = self
            .render(db, &sql, &params, OutputMode::JsonObject, &entity)
            .await?;
        Ok(QueryOutput {
            body,
            warnings,
            meta: None,
        })
    }

    /// Run a prepared query. Paginated queries run the count and the data query concurrently
    /// and fail as a whole if either fails.
    pub async fn execute(
        &self,
        db: &DatabaseConnection,
        prepared: PreparedQuery,
    ) -> Result<QueryOutput, ApiError> {
        let PreparedQuery {
            entity,
            plan,
            page,
            warnings,
        } = prepared;

        let Some(page) = page else {
            let body = self
                .render(db, &plan.render(), plan.params(), plan.output_mode(), &entity)
                .await?;
            return Ok(QueryOutput {
                body,
                warnings,
                meta: None,
            });
        };

        let (sql, params) = plan.render_page(page.window());
        let cache_key = (!plan.has_predicates()).then_some(entity.name);
        let count = async {
            if page.skip_count {
                Ok(0)
            } else {
                self.count(db, &plan, cache_key).await
            }
        };
        let data = self.render(db, &sql, &params, OutputMode::JsonArray, &entity);

        let (row_count, results) = try_join!(count, data)?;
        let meta = page.meta(row_count);
        Ok(QueryOutput {
            body: envelope_json(&meta, &results),
            warnings,
            meta: Some(meta),
        })
    }

    /// Total rows of the unpaginated plan. With a `cache_key` the count is memoized.
    pub async fn count(
        &self,
        db: &DatabaseConnection,
        plan: &QueryPlan,
        cache_key: Option<&str>,
    ) -> Result<u64, ApiError> {
        if let Some(key) = cache_key
            && let Some(count) = self.cache.get(key)
        {
            tracing::debug!(key, count, "row count served from cache");
            return Ok(count);
        }

        let sql = plan.render_count();
        let statement = bind(&sql, plan.params(), db.get_database_backend());
        let row = self.guarded(&sql, db.query_one(statement)).await?;
        let count = match row {
            Some(row) => row
                .try_get::<i64>("", COUNT_COLUMN)
                .map_err(|err| failed(&sql, err))?,
            None => 0,
        };
        let count = u64::try_from(count).unwrap_or_default();

        if let Some(key) = cache_key {
            tracing::debug!(key, count, "row count cached");
            self.cache.insert(key, count);
        }
        Ok(count)
    }

    /// Raw rows of a plan, optionally windowed.
    pub async fn rows(
        &self,
        db: &DatabaseConnection,
        plan: &QueryPlan,
        window: Option<PageWindow>,
    ) -> Result<Vec<QueryResult>, ApiError> {
        let (sql, params) = match window {
            Some(window) => plan.render_page(window),
            None => (plan.render(), plan.params().clone()),
        };
        let statement = bind(&sql, &params, db.get_database_backend());
        self.guarded(&sql, db.query_all(statement)).await
    }

    async fn render(
        &self,
        db: &DatabaseConnection,
        sql: &str,
        params: &ParamMap,
        shape: OutputMode,
        entity: &EntityDef,
    ) -> Result<String, ApiError> {
        let request = RenderRequest {
            sql,
            params,
            shape,
            entity,
        };
        self.guarded(sql, self.materializer.materialize(db, request))
            .await
    }

    /// Apply the command timeout and log the failure, if any.
    async fn guarded<T, F>(&self, sql: &str, operation: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.config.command_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(failed(sql, err)),
            Err(_) => {
                let seconds = self.config.command_timeout.as_secs();
                tracing::error!(sql, seconds, "query exceeded the command timeout");
                Err(ApiError::timeout(seconds))
            }
        }
    }
}

fn failed(sql: &str, err: DbErr) -> ApiError {
    tracing::error!(sql, error = %err, "query failed");
    ApiError::database(err)
}
