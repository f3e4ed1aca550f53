use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::FilterWarning;

pub const FILTER_WARNINGS_HEADER: &str = "x-filter-warnings";

/// One page of one query. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
    /// Skip the `COUNT(*)` query; totals are reported as zero
    pub skip_count: bool,
}

impl PageRequest {
    /// Page numbers below 1 are treated as 1 and page sizes below 1 as 1.
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            skip_count: false,
        }
    }

    #[must_use]
    pub const fn with_skip_count(mut self, skip_count: bool) -> Self {
        self.skip_count = skip_count;
        self
    }

    #[must_use]
    pub const fn window(&self) -> PageWindow {
        PageWindow {
            page_size: self.page_size,
            offset: (self.page - 1).saturating_mul(self.page_size),
        }
    }

    /// Page metadata for a total row count. Skip-count requests report zero totals.
    #[must_use]
    pub fn meta(&self, row_count: u64) -> PageMeta {
        let (row_count, page_count) = if self.skip_count {
            (0, 0)
        } else {
            (row_count, page_count(row_count, self.page_size))
        };
        PageMeta {
            current_page: self.page,
            page_size: self.page_size,
            row_count,
            page_count,
        }
    }
}

/// `LIMIT` / `OFFSET` pair derived from a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page_size: u64,
    pub offset: u64,
}

/// `ceil(row_count / page_size)`
#[must_use]
pub const fn page_count(row_count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        row_count.div_ceil(page_size)
    }
}

/// Pagination envelope fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub current_page: u64,
    pub page_size: u64,
    pub row_count: u64,
    pub page_count: u64,
}

/// Pagination envelope for typed results. `results` is omitted when the caller streams the
/// rows as JSON text instead (see [`envelope_json`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    pub current_page: u64,
    pub page_size: u64,
    pub row_count: u64,
    pub page_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<T>>,
}

impl<T> PagedResult<T> {
    #[must_use]
    pub fn new(meta: PageMeta, results: Option<Vec<T>>) -> Self {
        Self {
            current_page: meta.current_page,
            page_size: meta.page_size,
            row_count: meta.row_count,
            page_count: meta.page_count,
            results,
        }
    }
}

/// Splice already-rendered JSON results into the envelope without re-parsing them.
#[must_use]
pub fn envelope_json(meta: &PageMeta, results_json: &str) -> String {
    format!(
        "{{\"current_page\":{},\"page_size\":{},\"row_count\":{},\"page_count\":{},\"results\":{}}}",
        meta.current_page, meta.page_size, meta.row_count, meta.page_count, results_json
    )
}

/// Keep header-safe characters only
fn sanitize_header_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

/// Build the `X-Filter-Warnings` header listing degraded tokens. Empty when there are none.
#[must_use]
pub fn warnings_header(warnings: &[FilterWarning]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if warnings.is_empty() {
        return headers;
    }

    let joined = warnings
        .iter()
        .map(|w| sanitize_header_text(&w.to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    if let Ok(value) = HeaderValue::from_str(&joined) {
        headers.insert(HeaderName::from_static(FILTER_WARNINGS_HEADER), value);
    } else {
        headers.insert(
            HeaderName::from_static(FILTER_WARNINGS_HEADER),
            HeaderValue::from(warnings.len()),
        );
    }
    headers
}
