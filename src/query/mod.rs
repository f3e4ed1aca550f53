// Query text assembly and parameter binding

pub mod params;
pub mod plan;

pub use params::{ParamMap, ParamValue, bind, param_ref};
pub use plan::{InsertionPoint, OutputMode, QueryPlan, wrap_json};
