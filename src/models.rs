use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::pagination::PageRequest;

/// `pagination_type` value that skips the `COUNT(*)` query. Any other value counts.
pub const SKIP_COUNT_PAGINATION: &str = "1";

/// Query parameters for filtering, sorting and paginating a listing.
///
/// # Filtering
/// `filter_by` holds `field<op>value` tokens joined by `/` (AND) or `|` (OR):
/// - **Contains (case-insensitive):** `name¬foo`
/// - **Equality:** `active=true` (text properties match case-insensitively as a substring)
/// - **Ranges:** `price>=100`, `created_at<2024-01-01`
/// - **Membership:** `status=1;2;3`
/// - **Null check:** `deleted_at=null`
/// - **Any property:** `all=acme`
///
/// # Pagination
/// `page` is 1-based; without it the whole result set is returned. `take` defaults to the
/// configured page size. `pagination_type=1` skips the total count (totals are reported as 0).
///
/// # Sorting
/// `order_by` is a comma-separated list, for example `created_at desc,name`.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema, Default)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Filter expression.
    ///
    /// Example: `name¬foo/active=true`
    #[param(example = "name¬foo/active=true")]
    pub filter_by: Option<String>,
    /// Sort list, optionally dotted for joined entities.
    ///
    /// Example: `created_at desc,name`
    #[param(example = "created_at desc,name")]
    pub order_by: Option<String>,
    /// Page number (1-based). Omit to disable pagination.
    ///
    /// Example: `1`
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Page size.
    ///
    /// Example: `20`
    #[param(example = 20)]
    pub take: Option<u64>,
    /// `1` skips the total row count; anything else is ignored.
    #[param(example = "1")]
    pub pagination_type: Option<String>,
    /// Projection list, handled by the surrounding handler.
    pub select_args: Option<String>,
}

impl ListQuery {
    /// The requested page, `None` when `page` is absent.
    #[must_use]
    pub fn page_request(&self, default_page_size: u64) -> Option<PageRequest> {
        let page = self.page?;
        let page_size = self.take.unwrap_or(default_page_size);
        Some(PageRequest::new(page, page_size).with_skip_count(self.skip_count()))
    }

    #[must_use]
    pub fn skip_count(&self) -> bool {
        self.pagination_type.as_deref().map(str::trim) == Some(SKIP_COUNT_PAGINATION)
    }

    #[must_use]
    pub fn has_projection(&self) -> bool {
        self.select_args.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// The non-blank `filter_by` expression.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter_by.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    /// The non-blank `order_by` list.
    #[must_use]
    pub fn order(&self) -> Option<&str> {
        self.order_by.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }
}
