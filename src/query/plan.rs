//! Query plan assembly.
//!
//! A [`QueryPlan`] accumulates one logical query: the caller's base `SELECT`, the predicates
//! produced by the filter compiler and the scope resolver, optional `GROUP BY` / `ORDER BY`
//! bodies and the parameters they reference. Rendering is purely textual; the caller decides
//! where the predicates land with an [`InsertionPoint`].

use super::params::{ParamMap, ParamValue, param_ref};
use crate::pagination::PageWindow;

pub const PAGE_SIZE_PARAM: &str = "PageSize";
pub const OFFSET_PARAM: &str = "Offset";

/// Where the predicate clause is emitted relative to the caller's clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertionPoint {
    #[default]
    BeforeGroupBy = 0,
    AfterGroupBy = 1,
    AfterOrderBy = 2,
    AfterPagination = 3,
}

impl TryFrom<u8> for InsertionPoint {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::BeforeGroupBy),
            1 => Ok(Self::AfterGroupBy),
            2 => Ok(Self::AfterOrderBy),
            3 => Ok(Self::AfterPagination),
            other => Err(other),
        }
    }
}

/// How the result set leaves the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    JsonArray,
    JsonObject,
    RawRows,
}

#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    base: String,
    group_by: Option<String>,
    order_by: Option<String>,
    insertion: InsertionPoint,
    predicates: Vec<String>,
    params: ParamMap,
    caller_params: bool,
    existing_where: bool,
    output: OutputMode,
}

impl QueryPlan {
    /// Start from a base `SELECT` that carries no `WHERE` of its own.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim().trim_end_matches(';').to_string(),
            ..Self::default()
        }
    }

    /// Parameters the base query already references. A non-empty set implies the base query
    /// has its own `WHERE`, so compiled predicates are joined with `AND`.
    #[must_use]
    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.caller_params = !params.is_empty();
        self.params.extend(params);
        self
    }

    /// Declare that a `WHERE` is already present upstream.
    #[must_use]
    pub fn with_existing_where(mut self, existing: bool) -> Self {
        self.existing_where = existing;
        self
    }

    #[must_use]
    pub fn group_by(mut self, clause: impl Into<String>) -> Self {
        self.group_by = non_empty(clause_body(&clause.into(), "GROUP BY"));
        self
    }

    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = non_empty(clause_body(&clause.into(), "ORDER BY"));
        self
    }

    #[must_use]
    pub fn insert_at(mut self, point: InsertionPoint) -> Self {
        self.insertion = point;
        self
    }

    #[must_use]
    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    /// Add one predicate fragment with the parameters it references. Empty fragments are
    /// ignored.
    pub fn push_predicate(&mut self, fragment: &str, params: ParamMap) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        self.predicates.push(fragment.to_string());
        self.params.extend(params);
    }

    #[must_use]
    pub fn has_predicates(&self) -> bool {
        !self.predicates.is_empty()
    }

    #[must_use]
    pub const fn params(&self) -> &ParamMap {
        &self.params
    }

    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        self.output
    }

    #[must_use]
    pub const fn insertion_point(&self) -> InsertionPoint {
        self.insertion
    }

    /// The complete query without pagination.
    #[must_use]
    pub fn render(&self) -> String {
        self.assemble(None)
    }

    /// The query with `LIMIT @PageSize OFFSET @Offset` plus the parameters to bind with it.
    #[must_use]
    pub fn render_page(&self, window: PageWindow) -> (String, ParamMap) {
        let mut params = self.params.clone();
        params.insert(PAGE_SIZE_PARAM, ParamValue::Int(to_i64(window.page_size)));
        params.insert(OFFSET_PARAM, ParamValue::Int(to_i64(window.offset)));
        (self.assemble(Some(window)), params)
    }

    /// `SELECT COUNT(*)` over the unpaginated query.
    #[must_use]
    pub fn render_count(&self) -> String {
        format!("SELECT COUNT(*) AS count FROM ({}) AS p", self.render())
    }

    fn where_clause(&self) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        let keyword = if self.existing_where || self.caller_params {
            "AND"
        } else {
            "WHERE"
        };
        Some(format!("{keyword} {}", self.predicates.join(" AND ")))
    }

    fn assemble(&self, window: Option<PageWindow>) -> String {
        let where_clause = self.where_clause();
        let mut parts: Vec<String> = vec![self.base.clone()];
        let emit_where = |point: InsertionPoint, parts: &mut Vec<String>| {
            if self.insertion == point
                && let Some(clause) = &where_clause
            {
                parts.push(clause.clone());
            }
        };

        emit_where(InsertionPoint::BeforeGroupBy, &mut parts);
        if let Some(group_by) = &self.group_by {
            parts.push(format!("GROUP BY {group_by}"));
        }
        emit_where(InsertionPoint::AfterGroupBy, &mut parts);
        if let Some(order_by) = &self.order_by {
            parts.push(format!("ORDER BY {order_by}"));
        }
        emit_where(InsertionPoint::AfterOrderBy, &mut parts);
        if window.is_some() {
            parts.push(format!(
                "LIMIT {} OFFSET {}",
                param_ref(PAGE_SIZE_PARAM),
                param_ref(OFFSET_PARAM)
            ));
        }
        emit_where(InsertionPoint::AfterPagination, &mut parts);

        parts.join(" ")
    }
}

/// Wrap a query so the database renders the whole result as one JSON text scalar.
///
/// The outer `::text` cast keeps the database's own key order and formatting intact when the
/// driver reads the value back.
#[must_use]
pub fn wrap_json(sql: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::JsonObject => format!("SELECT row_to_json(t)::text AS json FROM ({sql}) t"),
        OutputMode::JsonArray => format!(
            "SELECT COALESCE(array_to_json(array_agg(row_to_json(t))), '[]')::text AS json FROM ({sql}) t"
        ),
        OutputMode::RawRows => sql.to_string(),
    }
}

fn clause_body(clause: &str, keyword: &str) -> String {
    let trimmed = clause.trim();
    match trimmed.get(..keyword.len()) {
        Some(head) if head.eq_ignore_ascii_case(keyword) => trimmed[keyword.len()..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
