pub mod cache;
pub mod executor;

pub use cache::{CacheStats, CountCache, RowCountCache};
pub use executor::{COUNT_COLUMN, PreparedQuery, QueryEngine, QueryOutput};
