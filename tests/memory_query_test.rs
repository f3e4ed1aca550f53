mod common;

use common::{Customer, registry};
use querycrate::filtering::resolve_scope;
use querycrate::{ListQuery, MemoryQuery, QueryResource, ScopeConfig, StaticPrincipal};
use serde::Serialize;

#[derive(Serialize)]
struct CustomerRow {
    id: i64,
    name: String,
    company_id: i64,
}

fn customers() -> Vec<CustomerRow> {
    (1..=25)
        .map(|id| CustomerRow {
            id,
            name: format!("Customer {id:02}"),
            company_id: if id % 5 == 0 { 2 } else { 1 },
        })
        .collect()
}

fn ids(output: &querycrate::MemoryOutput) -> Vec<i64> {
    output
        .rows
        .iter()
        .filter_map(|row| row.get("id").and_then(serde_json::Value::as_i64))
        .collect()
}

#[test]
fn test_page_two_matches_database_semantics() {
    let query = ListQuery {
        page: Some(2),
        take: Some(10),
        ..ListQuery::default()
    };
    let output = MemoryQuery::for_entity(Customer::entity_def())
        .run_typed(&customers(), &query)
        .unwrap();

    assert_eq!(ids(&output), (11..=20).collect::<Vec<_>>());
    let meta = output.meta.unwrap();
    assert_eq!((meta.row_count, meta.page_count), (25, 3));
}

#[test]
fn test_scope_resolved_from_registry() {
    let registry = registry();
    let principal = StaticPrincipal::authenticated().with_claim("company_id", 2);
    let scope = resolve_scope(
        &registry,
        &Customer::entity_def(),
        &ScopeConfig::default(),
        &principal,
    )
    .unwrap();

    let output = MemoryQuery::for_entity(Customer::entity_def())
        .with_scope(scope)
        .run_typed(&customers(), &ListQuery::default())
        .unwrap();

    assert_eq!(ids(&output), vec![5, 10, 15, 20, 25]);
}

#[test]
fn test_missing_scope_value_matches_nothing() {
    let registry = registry();
    let scope = resolve_scope(
        &registry,
        &Customer::entity_def(),
        &ScopeConfig::default(),
        &StaticPrincipal::anonymous(),
    )
    .unwrap();

    let output = MemoryQuery::for_entity(Customer::entity_def())
        .with_scope(scope)
        .run_typed(&customers(), &ListQuery::default())
        .unwrap();

    assert!(output.rows.is_empty());
}

#[test]
fn test_mixed_dividers_and_sorting() {
    let query = ListQuery {
        filter_by: Some("id<3|id>23/company_id=1".into()),
        order_by: Some("name desc".into()),
        ..ListQuery::default()
    };
    let output = MemoryQuery::for_entity(Customer::entity_def())
        .run_typed(&customers(), &query)
        .unwrap();

    // ((id < 3 OR id > 23) AND company_id = 1)
    assert_eq!(ids(&output), vec![24, 2, 1]);
}

#[test]
fn test_membership_filter() {
    let query = ListQuery {
        filter_by: Some("id=3;4;99".into()),
        ..ListQuery::default()
    };
    let output = MemoryQuery::new().run_typed(&customers(), &query).unwrap();
    assert_eq!(ids(&output), vec![3, 4]);
}
