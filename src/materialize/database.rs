use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

use super::{RenderRequest, RowMaterializer, empty_json, json_shape};
use crate::query::{bind, wrap_json};

/// Column holding the aggregated JSON text.
pub const JSON_COLUMN: &str = "json";

/// Database-side aggregation: Postgres renders the JSON, the driver returns it as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseJson;

#[async_trait]
impl RowMaterializer for DatabaseJson {
    fn name(&self) -> &'static str {
        "database_json"
    }

    async fn materialize(
        &self,
        db: &DatabaseConnection,
        request: RenderRequest<'_>,
    ) -> Result<String, DbErr> {
        let shape = json_shape(request.shape);
        let statement = bind(
            &wrap_json(request.sql, shape),
            request.params,
            db.get_database_backend(),
        );

        let json = match db.query_one(statement).await? {
            Some(row) => row.try_get::<Option<String>>("", JSON_COLUMN)?,
            None => None,
        };
        Ok(json.unwrap_or_else(|| empty_json(shape).to_string()))
    }
}
