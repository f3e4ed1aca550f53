// Entity descriptions: what can be filtered, sorted and projected

pub mod schema;
pub mod traits;

pub use schema::{EntityDef, FieldDef, FieldType, SchemaRegistry, normalize_name};
pub use traits::QueryResource;
