mod common;

use common::{Customer, Order, count_and_json, executed_sql, mock_db, registry, scoped_engine};
use querycrate::filtering::{resolve_scope, resolve_scope_rule};
use querycrate::{
    EntityDef, FieldDef, FieldType, ListQuery, ParamValue, QueryResource, ScopeConfig,
    SchemaRegistry, StaticPrincipal,
};

fn entity(name: &'static str, fields: Vec<FieldDef>, scoped: bool) -> EntityDef {
    EntityDef {
        name,
        table: name,
        fields,
        scoped,
    }
}

#[test]
fn test_direct_column_wins() {
    let registry = registry();
    let rule = resolve_scope_rule(&registry, &Customer::entity_def(), &ScopeConfig::default());
    assert_eq!(rule.unwrap().path, "company_id");
}

#[test]
fn test_relation_walk_finds_column_on_customer() {
    let registry = registry();
    let rule = resolve_scope_rule(&registry, &Order::entity_def(), &ScopeConfig::default());
    assert_eq!(rule.unwrap().path, "customer.company_id");
}

#[test]
fn test_candidates_are_tried_in_descending_name_order() {
    let mut registry = SchemaRegistry::new();
    registry
        .register_entity(entity(
            "Branch",
            vec![FieldDef::new("company_id", FieldType::Integer)],
            true,
        ))
        .register_entity(entity(
            "Warehouse",
            vec![FieldDef::new("company_id", FieldType::Integer)],
            true,
        ));
    let shipment = entity(
        "Shipment",
        vec![
            FieldDef::relation("alpha", "Branch"),
            FieldDef::relation("beta", "Warehouse"),
        ],
        false,
    );

    let rule = resolve_scope_rule(&registry, &shipment, &ScopeConfig::default()).unwrap();
    assert_eq!(rule.path, "beta.company_id");
}

#[test]
fn test_cyclic_relations_terminate() {
    let mut registry = SchemaRegistry::new();
    registry
        .register_entity(entity("A", vec![FieldDef::relation("b", "B")], true))
        .register_entity(entity("B", vec![FieldDef::relation("a", "A")], true));
    let a = registry.get("A").unwrap().clone();

    assert!(resolve_scope_rule(&registry, &a, &ScopeConfig::default()).is_none());
}

#[test]
fn test_depth_is_bounded() {
    let mut registry = SchemaRegistry::new();
    registry
        .register_entity(entity("L1", vec![FieldDef::relation("next", "L2")], true))
        .register_entity(entity("L2", vec![FieldDef::relation("next", "L3")], true))
        .register_entity(entity(
            "L3",
            vec![FieldDef::new("company_id", FieldType::Integer)],
            true,
        ));
    let root = entity("Root", vec![FieldDef::relation("next", "L1")], false);

    let deep = ScopeConfig::default();
    assert_eq!(
        resolve_scope_rule(&registry, &root, &deep).unwrap().path,
        "next.next.next.company_id"
    );

    let shallow = ScopeConfig {
        max_depth: 2,
        ..ScopeConfig::default()
    };
    assert!(resolve_scope_rule(&registry, &root, &shallow).is_none());
}

#[test]
fn test_identity_entities_are_followed_even_when_unscoped() {
    let mut registry = SchemaRegistry::new();
    registry
        .register_entity(entity(
            "User",
            vec![FieldDef::new("CompanyId", FieldType::Integer)],
            false,
        ))
        .register_entity(entity(
            "Tag",
            vec![FieldDef::new("company_id", FieldType::Integer)],
            false,
        ));
    let note = entity(
        "Note",
        vec![FieldDef::relation("author", "User"), FieldDef::relation("tag", "Tag")],
        false,
    );

    let rule = resolve_scope_rule(&registry, &note, &ScopeConfig::default()).unwrap();
    assert_eq!(rule.path, "author.CompanyId");
}

#[test]
fn test_session_fallback_for_anonymous_callers() {
    let registry = registry();
    let guest = StaticPrincipal::anonymous().with_session("company_id", 5);
    let resolved = resolve_scope(
        &registry,
        &Customer::entity_def(),
        &ScopeConfig::default(),
        &guest,
    )
    .unwrap();
    assert_eq!(resolved.value, ParamValue::Int(5));
}

#[tokio::test]
async fn test_scope_predicate_joins_filter() {
    let db = mock_db([vec![count_and_json(0, "[]")]]);
    let principal = StaticPrincipal::authenticated().with_claim("company_id", 7);
    let query = ListQuery {
        filter_by: Some("active=true".into()),
        ..ListQuery::default()
    };

    scoped_engine()
        .list::<Order, _>(&db, &query, &principal)
        .await
        .unwrap();

    let sql = executed_sql(db);
    assert!(sql.contains("WHERE (active = $1) AND customer.company_id = $2"), "{sql}");
    assert!(sql.contains("Int(Some(7))") || sql.contains("BigInt(Some(7))"), "{sql}");
}

#[tokio::test]
async fn test_unscoped_entity_gets_no_predicate() {
    let db = mock_db([vec![count_and_json(0, "[]")]]);
    let principal = StaticPrincipal::authenticated().with_claim("company_id", 7);

    scoped_engine()
        .list::<common::Company, _>(&db, &ListQuery::default(), &principal)
        .await
        .unwrap();

    assert!(!executed_sql(db).contains("WHERE"));
}

#[tokio::test]
async fn test_missing_claim_renders_false_without_parameters() {
    let db = mock_db([vec![count_and_json(0, "[]")]]);

    let output = scoped_engine()
        .list::<Customer, _>(&db, &ListQuery::default(), &StaticPrincipal::authenticated())
        .await
        .unwrap();

    assert_eq!(output.body, "[]");
    let sql = executed_sql(db);
    assert!(sql.contains("WHERE FALSE"), "{sql}");
    assert!(!sql.contains("company_id ="), "{sql}");
    assert!(sql.contains("values: Some(Values([]))"), "{sql}");
}
