/*!
# Filter Benchmarks

Compiler, binder and encoder throughput; no database required.

## Usage

```bash
cargo bench --bench filter_benchmarks

# Single group
cargo bench --bench filter_benchmarks -- "Filter Compilation"

# Quick run
cargo bench --bench filter_benchmarks -- --quick
```

HTML reports are generated in `target/criterion/report/index.html`.
*/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use querycrate::materialize::{Cell, encode_rows};
use querycrate::query::bind;
use querycrate::{EntityDef, FieldDef, FieldType, MemoryQuery, ListQuery, compile_filter};
use sea_orm::DbBackend;
use std::hint::black_box;
use std::time::Duration;

fn order() -> EntityDef {
    EntityDef {
        name: "Order",
        table: "orders",
        fields: vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::Text),
            FieldDef::new("active", FieldType::Boolean),
            FieldDef::new("price", FieldType::Decimal),
            FieldDef::new("status", FieldType::Integer),
            FieldDef::new("created_at", FieldType::DateTime),
        ],
        scoped: false,
    }
}

fn bench_compile(c: &mut Criterion) {
    let entity = order();
    let mut group = c.benchmark_group("Filter Compilation");
    for expression in [
        "price>=100",
        "name¬foo/active=true",
        "name=a|price>3/active=false|status=1;2;3/created_at>=2024-02-01",
        "all=acme",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(expression), expression, |b, e| {
            b.iter(|| compile_filter(black_box(&entity), black_box(e)));
        });
    }
    group.finish();
}

fn bench_bind(c: &mut Criterion) {
    let compiled = compile_filter(&order(), "name=a|price>3/active=false|status=1;2;3");
    let sql = format!("SELECT id, name FROM orders WHERE {}", compiled.fragment);
    c.bench_function("Bind Postgres", |b| {
        b.iter(|| bind(black_box(&sql), black_box(&compiled.params), DbBackend::Postgres));
    });
}

fn bench_encode(c: &mut Criterion) {
    let rows: Vec<Vec<(&str, Cell)>> = (0..500)
        .map(|id| {
            vec![
                ("id", Cell::Int(id)),
                ("name", Cell::Text(format!("order \"{id}\""))),
                ("active", Cell::Bool(id % 2 == 0)),
                ("notes", Cell::Null),
            ]
        })
        .collect();
    c.bench_function("Encode 500 rows", |b| b.iter(|| encode_rows(black_box(&rows))));
}

fn bench_memory(c: &mut Criterion) {
    let rows: Vec<_> = (0..1000)
        .filter_map(|id| {
            serde_json::json!({"id": id, "name": format!("order {id}"), "active": id % 3 == 0})
                .as_object()
                .cloned()
        })
        .collect();
    let query = ListQuery {
        filter_by: Some("active=true/name¬order 1".into()),
        order_by: Some("id desc".into()),
        page: Some(2),
        take: Some(20),
        ..ListQuery::default()
    };
    let engine = MemoryQuery::new();
    c.bench_function("Memory query 1000 rows", |b| {
        b.iter(|| engine.run(black_box(rows.clone()), black_box(&query)));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_compile, bench_bind, bench_encode, bench_memory
}
criterion_main!(benches);
