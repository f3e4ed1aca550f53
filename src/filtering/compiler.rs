//! `filter_by` compiler.
//!
//! Tokens are resolved against an entity's scalar properties, coerced one by one and folded
//! left to right into a single predicate. Whenever the divider changes, the expression built
//! so far is closed into a group, so `a/b|c/d` reads as `((a AND b) OR c) AND d`.

use super::ast::Predicate;
use super::coercion::{broadcast, coerce};
use super::grammar::{Combinator, FilterOp, FilterToken, tokenize};
use crate::core::{EntityDef, FieldType, normalize_name};
use crate::errors::{FilterWarning, WarningKind};
use crate::query::ParamMap;

/// Field name broadcasting the token across every scalar property.
pub const BROADCAST_FIELD: &str = "all";
/// In-memory shorthand for a contains match on every property.
pub const ANY_FIELD: &str = "$";

/// The set of properties a filter may reference.
pub trait FieldSet {
    /// Resolve a field name to its column path and, when known, its type.
    fn resolve(&self, name: &str) -> Option<(String, Option<FieldType>)>;

    /// Every property an `all` token broadcasts over.
    fn broadcast_fields(&self) -> Vec<(String, Option<FieldType>)>;
}

impl FieldSet for EntityDef {
    fn resolve(&self, name: &str) -> Option<(String, Option<FieldType>)> {
        self.find_scalar(name)
            .map(|f| (f.name.to_string(), Some(f.field_type)))
    }

    fn broadcast_fields(&self) -> Vec<(String, Option<FieldType>)> {
        self.scalar_fields()
            .map(|f| (f.name.to_string(), Some(f.field_type)))
            .collect()
    }
}

/// Property names discovered from schema-less data; every type is inferred from the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicFields {
    names: Vec<String>,
}

impl DynamicFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = Self::default();
        for name in names {
            fields.push(name.into());
        }
        fields
    }

    /// Collect the keys of JSON objects, first-seen order.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a serde_json::Map<String, serde_json::Value>>,
    {
        let mut fields = Self::default();
        for row in rows {
            for key in row.keys() {
                fields.push(key.clone());
            }
        }
        fields
    }

    fn push(&mut self, name: String) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }
}

impl FieldSet for DynamicFields {
    fn resolve(&self, name: &str) -> Option<(String, Option<FieldType>)> {
        if name.contains('.') {
            return Some((name.to_string(), None));
        }
        let wanted = normalize_name(name);
        self.names
            .iter()
            .find(|n| n.as_str() == name || normalize_name(n) == wanted)
            .map(|n| (n.clone(), None))
    }

    fn broadcast_fields(&self) -> Vec<(String, Option<FieldType>)> {
        self.names.iter().map(|n| (n.clone(), None)).collect()
    }
}

/// Where the compiled predicate runs. Only the in-memory target understands `$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Sql,
    Memory,
}

/// A folded predicate plus the tokens that contributed nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFilter {
    pub predicate: Option<Predicate>,
    pub warnings: Vec<FilterWarning>,
}

/// A `WHERE` fragment ready for the plan assembler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    /// Parenthesized predicate, empty when nothing applied
    pub fragment: String,
    pub params: ParamMap,
    pub warnings: Vec<FilterWarning>,
}

impl CompiledFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragment.is_empty()
    }
}

/// Compile a `filter_by` expression to SQL against `entity`.
///
/// ```rust,ignore
/// let compiled = compile_filter(&Order::entity_def(), "name¬foo/active=true");
/// assert_eq!(compiled.fragment, "(name ILIKE @P_0_ AND active = @P_1_)");
/// ```
#[must_use]
pub fn compile_filter(entity: &EntityDef, expression: &str) -> CompiledFilter {
    let ParsedFilter {
        predicate,
        warnings,
    } = parse_filter(entity, expression, Target::Sql);
    let (fragment, params) = predicate
        .map(|p| p.to_sql_with_params())
        .unwrap_or_default();
    CompiledFilter {
        fragment,
        params,
        warnings,
    }
}

/// Parse, resolve and coerce every token, then fold them into one predicate.
pub fn parse_filter<F: FieldSet + ?Sized>(
    fields: &F,
    expression: &str,
    target: Target,
) -> ParsedFilter {
    let mut warnings = Vec::new();
    let mut terms: Vec<(Combinator, Predicate)> = Vec::new();

    for token in tokenize(expression) {
        let token = match token {
            Ok(token) => token,
            Err(warning) => {
                drop_token(&mut warnings, warning);
                continue;
            }
        };

        if token.field.eq_ignore_ascii_case(BROADCAST_FIELD) {
            let candidates = fields.broadcast_fields();
            let predicate = broadcast(
                candidates.iter().map(|(path, ty)| (path.as_str(), *ty)),
                token.op,
                token.value,
            );
            match predicate {
                Some(predicate) => terms.push((token.combinator, predicate)),
                None => drop_token(
                    &mut warnings,
                    FilterWarning::new(token.raw, WarningKind::UnparseableValue),
                ),
            }
            break;
        }

        if token.field == ANY_FIELD && target == Target::Memory {
            let candidates = fields.broadcast_fields();
            match broadcast(
                candidates.iter().map(|(path, ty)| (path.as_str(), *ty)),
                FilterOp::Contains,
                token.value,
            ) {
                Some(predicate) => terms.push((token.combinator, predicate)),
                None => drop_token(
                    &mut warnings,
                    FilterWarning::new(token.raw, WarningKind::UnknownField),
                ),
            }
            continue;
        }

        match compile_token(fields, &token) {
            Ok(predicate) => terms.push((token.combinator, predicate)),
            Err(kind) => drop_token(&mut warnings, FilterWarning::new(token.raw, kind)),
        }
    }

    ParsedFilter {
        predicate: fold(terms),
        warnings,
    }
}

fn compile_token<F: FieldSet + ?Sized>(
    fields: &F,
    token: &FilterToken<'_>,
) -> Result<Predicate, WarningKind> {
    let (path, field_type) = fields
        .resolve(token.field)
        .ok_or(WarningKind::UnknownField)?;
    coerce(field_type, &path, token.op, token.value)
}

fn drop_token(warnings: &mut Vec<FilterWarning>, warning: FilterWarning) {
    tracing::debug!(
        token = %warning.token,
        kind = warning.kind.as_str(),
        "filter token contributes no predicate"
    );
    warnings.push(warning);
}

/// Left-to-right fold, grouping the running run whenever the divider changes.
fn fold(terms: Vec<(Combinator, Predicate)>) -> Option<Predicate> {
    let mut run: Vec<Predicate> = Vec::new();
    let mut divider: Option<Combinator> = None;

    for (combinator, predicate) in terms {
        if run.is_empty() {
            run.push(predicate);
            continue;
        }
        match divider {
            Some(current) if current != combinator => {
                let closed = group(current, std::mem::take(&mut run));
                run.push(closed);
            }
            _ => {}
        }
        divider = Some(combinator);
        run.push(predicate);
    }

    match (run.len(), divider) {
        (0, _) => None,
        (1, _) => run.pop().map(|single| match single {
            group @ (Predicate::All(_) | Predicate::Any(_)) => group,
            simple => Predicate::All(vec![simple]),
        }),
        (_, Some(divider)) => Some(group(divider, run)),
        (_, None) => Some(Predicate::All(run)),
    }
}

fn group(divider: Combinator, items: Vec<Predicate>) -> Predicate {
    match divider {
        Combinator::And => Predicate::All(items),
        Combinator::Or => Predicate::Any(items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldDef;
    use crate::query::ParamValue;

    fn order() -> EntityDef {
        EntityDef {
            name: "Order",
            table: "orders",
            fields: vec![
                FieldDef::new("id", FieldType::Integer),
                FieldDef::new("name", FieldType::Text),
                FieldDef::new("active", FieldType::Boolean),
                FieldDef::new("price", FieldType::Integer),
                FieldDef::relation("customer", "Customer"),
            ],
            scoped: false,
        }
    }

    #[test]
    fn test_and_scenario() {
        let compiled = compile_filter(&order(), "name¬foo/active=true");
        assert_eq!(compiled.fragment, "(name ILIKE @P_0_ AND active = @P_1_)");
        assert_eq!(compiled.params.len(), 2);
        assert_eq!(compiled.params.get("P_0_"), Some(&ParamValue::Text("%foo%".into())));
        assert_eq!(compiled.params.get("P_1_"), Some(&ParamValue::Bool(true)));
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_single_numeric_range() {
        let compiled = compile_filter(&order(), "price>=100");
        assert_eq!(compiled.fragment, "(price >= @P_0_)");
        assert_eq!(compiled.params.get("P_0_"), Some(&ParamValue::Int(100)));
    }

    #[test]
    fn test_or_only() {
        let compiled = compile_filter(&order(), "id=1|id=2|id=3");
        assert_eq!(compiled.fragment, "(id = @P_0_ OR id = @P_1_ OR id = @P_2_)");
    }

    #[test]
    fn test_mixed_dividers_group_left_to_right() {
        let compiled = compile_filter(&order(), "id=1/id=2|id=3/id=4");
        assert_eq!(
            compiled.fragment,
            "(((id = @P_0_ AND id = @P_1_) OR id = @P_2_) AND id = @P_3_)"
        );
    }

    #[test]
    fn test_unknown_field_is_dropped_with_warning() {
        let compiled = compile_filter(&order(), "nope=1");
        assert!(compiled.is_empty());
        assert!(compiled.params.is_empty());
        assert_eq!(
            compiled.warnings,
            vec![FilterWarning::new("nope=1", WarningKind::UnknownField)]
        );
    }

    #[test]
    fn test_relations_are_not_filterable() {
        let compiled = compile_filter(&order(), "customer=1/id=2");
        assert_eq!(compiled.fragment, "(id = @P_0_)");
        assert_eq!(compiled.warnings.len(), 1);
    }

    #[test]
    fn test_all_broadcast_stops_the_stream() {
        let compiled = compile_filter(&order(), "all=foo/id=1");
        assert_eq!(
            compiled.fragment,
            "(CAST(id AS TEXT) ILIKE @P_0_ OR name ILIKE @P_1_ OR CAST(active AS TEXT) ILIKE @P_2_ OR CAST(price AS TEXT) ILIKE @P_3_)"
        );
        assert_eq!(compiled.params.len(), 4);
    }

    #[test]
    fn test_dollar_is_unknown_in_sql() {
        let compiled = compile_filter(&order(), "$=foo");
        assert!(compiled.is_empty());
        assert_eq!(compiled.warnings[0].kind, WarningKind::UnknownField);
    }

    #[test]
    fn test_dollar_in_memory_is_contains_all() {
        let fields = DynamicFields::new(["name", "city"]);
        let parsed = parse_filter(&fields, "$=ber", Target::Memory);
        let row = serde_json::json!({"name": "x", "city": "Berlin"});
        assert!(parsed.predicate.unwrap().matches(row.as_object().unwrap()));
    }

    #[test]
    fn test_malformed_token_reported() {
        let compiled = compile_filter(&order(), "garbage/id=1");
        assert_eq!(compiled.fragment, "(id = @P_0_)");
        assert_eq!(compiled.warnings[0].kind, WarningKind::MalformedToken);
    }

    #[test]
    fn test_compile_is_idempotent() {
        let a = compile_filter(&order(), "name=x|price<5/active=false");
        let b = compile_filter(&order(), "name=x|price<5/active=false");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dynamic_fields_normalize_names() {
        let fields = DynamicFields::new(["company_id"]);
        assert_eq!(fields.resolve("CompanyId"), Some(("company_id".to_string(), None)));
        assert!(fields.resolve("other").is_none());
    }
}
