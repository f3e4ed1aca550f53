#![allow(dead_code)]

use querycrate::{
    EngineConfig, FieldDef, FieldType, QueryEngine, QueryResource, ScopeConfig, SchemaRegistry,
    register_resources,
};
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, Value};
use std::collections::BTreeMap;

pub type MockRow = BTreeMap<&'static str, Value>;

pub struct Company;

impl QueryResource for Company {
    const RESOURCE_NAME: &'static str = "Company";
    const TABLE_NAME: &'static str = "companies";

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::Text),
        ]
    }
}

pub struct Customer;

impl QueryResource for Customer {
    const RESOURCE_NAME: &'static str = "Customer";
    const TABLE_NAME: &'static str = "customers";
    const SCOPED: bool = true;

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::Text),
            FieldDef::new("company_id", FieldType::Integer),
            FieldDef::relation("company", "Company"),
        ]
    }
}

/// Orders carry no `company_id`; they are scoped through their customer.
pub struct Order;

impl QueryResource for Order {
    const RESOURCE_NAME: &'static str = "Order";
    const TABLE_NAME: &'static str = "orders";

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::Text),
            FieldDef::new("active", FieldType::Boolean),
            FieldDef::new("price", FieldType::Integer),
            FieldDef::new("status", FieldType::Integer),
            FieldDef::new("created_at", FieldType::DateTime),
            FieldDef::relation("customer", "Customer"),
            FieldDef::new("lines", FieldType::Collection { target: "OrderLine" }),
            FieldDef::new("search_vector", FieldType::Storage),
        ]
    }

    fn base_query() -> String {
        "SELECT id, name, active, price, status, created_at FROM orders \
         JOIN (SELECT id AS customer_ref, company_id FROM customers) customer \
         ON customer.customer_ref = orders.customer_id"
            .to_string()
    }

    fn default_order() -> Option<String> {
        Some("id".to_string())
    }
}

pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    register_resources!(registry, Company, Customer, Order);
    registry
}

pub fn engine() -> QueryEngine {
    QueryEngine::new(registry(), EngineConfig::default())
}

pub fn scoped_engine() -> QueryEngine {
    QueryEngine::new(
        registry(),
        EngineConfig::default().with_scope(ScopeConfig::new("company_id")),
    )
}

/// A row usable by both the count and the aggregated data query, whichever runs first.
pub fn count_and_json(count: i64, json: &str) -> MockRow {
    BTreeMap::from([("count", Value::from(count)), ("json", Value::from(json))])
}

pub fn mock_db<I>(results: I) -> DatabaseConnection
where
    I: IntoIterator<Item = Vec<MockRow>>,
{
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(results)
        .into_connection()
}

pub fn failing_db(rows: Vec<MockRow>, error: DbErr) -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_errors([error])
        .append_query_results([rows])
        .into_connection()
}

/// Every statement the mock executed, as debug text.
pub fn executed_sql(db: DatabaseConnection) -> String {
    format!("{:?}", db.into_transaction_log())
}

/// `[{"id":from}, ..., {"id":to}]`
pub fn id_array(from: i64, to: i64) -> String {
    let items = (from..=to)
        .map(|id| format!("{{\"id\":{id}}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
