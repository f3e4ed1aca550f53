//! In-memory analogue of the query engine.
//!
//! Runs the same filter grammar, scope predicate, `order_by` and pagination over rows that are
//! already loaded, e.g. results of a third-party API or a cached listing. Without an entity
//! definition the property set is taken from the rows themselves and every value type is
//! inferred; the `$` field (contains on any property) is available here only.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::core::EntityDef;
use crate::errors::FilterWarning;
use crate::filtering::ast::lookup;
use crate::filtering::{
    DynamicFields, FieldSet, ResolvedScope, SortKey, Target, parse_filter, parse_order_by,
};
use crate::models::ListQuery;
use crate::pagination::{PageMeta, PagedResult};

pub type Row = Map<String, JsonValue>;

#[derive(Debug, Clone)]
pub struct MemoryQuery {
    entity: Option<EntityDef>,
    scope: Option<ResolvedScope>,
    default_page_size: u64,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            entity: None,
            scope: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Rows left after filtering, sorting and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryOutput {
    pub rows: Vec<Row>,
    pub meta: Option<PageMeta>,
    pub warnings: Vec<FilterWarning>,
}

impl MemoryOutput {
    /// Same body the database path produces: the envelope when paginated, a bare array
    /// otherwise.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self.meta {
            Some(meta) => serde_json::to_string(&PagedResult::new(meta, Some(self.rows.clone()))),
            None => serde_json::to_string(&self.rows),
        }
    }
}

impl MemoryQuery {
    /// Schema-less query; properties come from the rows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_entity(entity: EntityDef) -> Self {
        Self {
            entity: Some(entity),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ResolvedScope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    /// Filter, sort and page `rows`.
    #[must_use]
    pub fn run(&self, rows: Vec<Row>, query: &ListQuery) -> MemoryOutput {
        match &self.entity {
            Some(entity) => self.run_with(entity, rows, query),
            None => {
                let fields = DynamicFields::from_rows(&rows);
                self.run_with(&fields, rows, query)
            }
        }
    }

    /// Serialize typed items to JSON objects first; items that are not objects are skipped.
    pub fn run_typed<T: Serialize>(
        &self,
        items: &[T],
        query: &ListQuery,
    ) -> Result<MemoryOutput, serde_json::Error> {
        let rows = items
            .iter()
            .map(serde_json::to_value)
            .filter_map(|value| match value {
                Ok(JsonValue::Object(row)) => Some(Ok(row)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.run(rows, query))
    }

    fn run_with<F: FieldSet + ?Sized>(
        &self,
        fields: &F,
        mut rows: Vec<Row>,
        query: &ListQuery,
    ) -> MemoryOutput {
        let mut warnings = Vec::new();

        let filter = query.filter().and_then(|expression| {
            let parsed = parse_filter(fields, expression, Target::Memory);
            warnings.extend(parsed.warnings);
            parsed.predicate
        });
        let scope = self.scope.as_ref().map(ResolvedScope::predicate);
        rows.retain(|row| {
            scope.as_ref().is_none_or(|p| p.matches(row))
                && filter.as_ref().is_none_or(|p| p.matches(row))
        });

        if let Some(order_by) = query.order() {
            let sort = parse_order_by(fields, order_by, None);
            warnings.extend(sort.warnings.iter().cloned());
            if !sort.is_empty() {
                rows.sort_by(|a, b| compare_rows(a, b, &sort.keys));
            }
        }

        let Some(page) = query.page_request(self.default_page_size) else {
            return MemoryOutput {
                rows,
                meta: None,
                warnings,
            };
        };
        let total = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        let window = page.window();
        let rows = rows
            .into_iter()
            .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(window.page_size).unwrap_or(usize::MAX))
            .collect();
        MemoryOutput {
            rows,
            meta: Some(page.meta(total)),
            warnings,
        }
    }
}

fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ordering = compare_cells(lookup(a, &key.path), lookup(b, &key.path));
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Postgres ordering: nulls sort last ascending and first descending.
fn compare_cells(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            },
            (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
            (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
