//! # Filtering, Sorting & Scoping
//!
//! Turns the `filter_by` / `order_by` query-string parameters into predicates that run either
//! as parameterized SQL or against in-memory JSON rows.
//!
//! ## Grammar
//!
//! ```text
//! filter_by = token { ("/" | "|") token }
//! token     = field op value
//! op        = "=" | "¬" | "<" | ">" | "<=" | ">="
//! ```
//!
//! `/` joins with `AND`, `|` with `OR`. Runs of the same divider are grouped, left to right.
//!
//! ```rust,ignore
//! GET /orders?filter_by=name¬foo/active=true       // (name ILIKE '%foo%' AND active = true)
//! GET /orders?filter_by=price>=100                 // (price >= 100)
//! GET /orders?filter_by=status=1;2;3               // (status = ANY('{1,2,3}'))
//! GET /orders?filter_by=deleted_at=null            // (deleted_at IS NULL)
//! GET /orders?filter_by=all=acme                   // any scalar property contains "acme"
//! GET /orders?order_by=created_at desc,name
//! ```
//!
//! ## Degradation
//!
//! A token that names no scalar property, or whose value does not fit the property's type,
//! contributes no predicate. It is reported as a [`FilterWarning`](crate::FilterWarning) instead.

pub mod ast;
pub mod coercion;
pub mod compiler;
pub mod grammar;
pub mod scope;
pub mod search;
pub mod sort;

pub use ast::{Cast, Operand, ParamAllocator, Predicate, RangeOp};
pub use coercion::{broadcast, coerce};
pub use compiler::{
    CompiledFilter, DynamicFields, FieldSet, ParsedFilter, Target, compile_filter, parse_filter,
};
pub use grammar::{Combinator, FilterOp, FilterToken, tokenize};
pub use scope::{
    Principal, ResolvedScope, SCOPE_PARAM, ScopeRule, StaticPrincipal, resolve_scope,
    resolve_scope_rule, scope_value,
};
pub use search::escape_like_wildcards;
pub use sort::{ParsedSort, SortKey, parse_order_by};
