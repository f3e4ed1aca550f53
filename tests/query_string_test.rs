mod common;

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode, Uri},
    routing::get,
};
use common::{Order, count_and_json, engine, id_array, mock_db};
use querycrate::pagination::FILTER_WARNINGS_HEADER;
use querycrate::{ApiError, ListQuery, QueryEngine, QueryOutput, StaticPrincipal};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
    db: Arc<DatabaseConnection>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<QueryOutput, ApiError> {
    state
        .engine
        .list::<Order, _>(state.db.as_ref(), &query, &StaticPrincipal::anonymous())
        .await
}

fn app(db: DatabaseConnection) -> Router {
    let state = AppState {
        engine: Arc::new(engine()),
        db: Arc::new(db),
    };
    Router::new()
        .route("/orders", get(list_orders))
        .with_state(state)
}

#[test]
fn test_parse_all_parameters() {
    let uri: Uri = "/orders?filter_by=name%C2%ACfoo%2Factive%3Dtrue&order_by=created_at%20desc\
                    &page=2&take=10&pagination_type=1&select_args=id,name"
        .parse()
        .unwrap();
    let Query(query) = Query::<ListQuery>::try_from_uri(&uri).unwrap();

    assert_eq!(query.filter(), Some("name¬foo/active=true"));
    assert_eq!(query.order(), Some("created_at desc"));
    assert_eq!(query.page, Some(2));
    assert_eq!(query.take, Some(10));
    assert!(query.skip_count());
    assert!(query.has_projection());
}

#[test]
fn test_odd_pagination_signal_is_ignored() {
    for raw in ["abc", "300", "-1"] {
        let uri: Uri = format!("/orders?page=1&pagination_type={raw}").parse().unwrap();
        let Query(query) = Query::<ListQuery>::try_from_uri(&uri).unwrap();
        assert!(!query.page_request(20).unwrap().skip_count, "{raw}");
    }
}

#[test]
fn test_missing_parameters_are_none() {
    let uri: Uri = "/orders".parse().unwrap();
    let Query(query) = Query::<ListQuery>::try_from_uri(&uri).unwrap();
    assert!(query.filter().is_none());
    assert!(query.page_request(20).is_none());
}

#[tokio::test]
async fn test_handler_returns_envelope() {
    let rows = id_array(1, 2);
    let db = mock_db([vec![count_and_json(2, &rows)], vec![count_and_json(2, &rows)]]);

    let response = app(db)
        .oneshot(
            Request::builder()
                .uri("/orders?page=1&take=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert!(response.headers().get(FILTER_WARNINGS_HEADER).is_none());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["row_count"], 2);
    assert_eq!(body["results"][1]["id"], 2);
}

#[tokio::test]
async fn test_degraded_filter_keeps_status_and_reports_warning() {
    let db = mock_db([vec![count_and_json(0, &id_array(1, 3))]]);

    let response = app(db)
        .oneshot(
            Request::builder()
                .uri("/orders?filter_by=colour%3Dred")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(FILTER_WARNINGS_HEADER).unwrap(),
        "unknown_field: colour=red"
    );
}

#[tokio::test]
async fn test_database_failure_is_sanitized() {
    let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_errors([sea_orm::DbErr::Custom("relation \"orders\" does not exist".into())])
        .into_connection();

    let response = app(db)
        .oneshot(Request::builder().uri("/orders").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!body.contains("orders"));
}
