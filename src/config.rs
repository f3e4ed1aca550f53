//! Engine configuration.
//!
//! Every knob has a default, so `EngineConfig::default()` is a working configuration. The
//! struct deserializes from whatever configuration source the application already uses;
//! durations are plain seconds.
//!
//! ```rust,ignore
//! let config: EngineConfig = serde_json::from_value(json!({
//!     "command_timeout": 30,
//!     "default_page_size": 50,
//!     "scope": { "column": "company_id", "claim": "company" }
//! }))?;
//! ```

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_COUNT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_COUNT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_SCOPE_DEPTH: usize = 4;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard ceiling for every statement; exceeding it fails the request.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub command_timeout: Duration,
    /// Page size used when `take` is absent.
    pub default_page_size: u64,
    /// Sliding expiration of cached row counts.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub count_cache_ttl: Duration,
    /// Maximum number of cached row counts.
    pub count_cache_capacity: usize,
    /// Table alias prepended to undotted `order_by` fields (e.g. `t` gives `t.name`).
    pub join_prefix: Option<String>,
    /// Tenant scoping. `None` disables scoping altogether.
    pub scope: Option<ScopeConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            default_page_size: DEFAULT_PAGE_SIZE,
            count_cache_ttl: DEFAULT_COUNT_CACHE_TTL,
            count_cache_capacity: DEFAULT_COUNT_CACHE_CAPACITY,
            join_prefix: None,
            scope: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_join_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.join_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeConfig) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Where the tenant value lives and which column it restricts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Scoping column, compared after snake-case normalisation (`CompanyId` == `company_id`).
    pub column: String,
    /// Claim holding the scope value for authenticated principals.
    pub claim: String,
    /// Session key consulted when the principal is not authenticated.
    pub session_key: String,
    /// Entities that are always followed during the relation walk, scoped or not.
    pub identity_entities: Vec<String>,
    /// Maximum number of relation hops.
    pub max_depth: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            column: "company_id".to_string(),
            claim: "company_id".to_string(),
            session_key: "company_id".to_string(),
            identity_entities: vec!["User".to_string(), "Company".to_string()],
            max_depth: DEFAULT_SCOPE_DEPTH,
        }
    }
}

impl ScopeConfig {
    pub fn new(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            claim: column.clone(),
            session_key: column.clone(),
            column,
            ..Self::default()
        }
    }
}
