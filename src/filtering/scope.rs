//! Tenant scoping.
//!
//! The scoping column is looked up on the entity itself first. When the entity does not carry
//! it, relations pointing at scoped entities (or at one of the configured identity entities) are
//! followed, highest property name first, until an entity exposing the column is found. The walk
//! is bounded by [`ScopeConfig::max_depth`] and never revisits an entity already on the current
//! path.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::ast::{Operand, Predicate};
use crate::config::ScopeConfig;
use crate::core::{EntityDef, FieldType, SchemaRegistry};
use crate::query::{ParamMap, ParamValue, param_ref};

/// Parameter name the scope predicate binds.
pub const SCOPE_PARAM: &str = "ScopeValue";

/// The caller's identity, as far as scoping is concerned.
pub trait Principal: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn claim(&self, name: &str) -> Option<String>;

    /// Fallback storage for unauthenticated callers
    fn session_value(&self, key: &str) -> Option<String>;
}

/// A principal backed by plain maps; useful for background jobs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipal {
    authenticated: bool,
    claims: HashMap<String, String>,
    session: HashMap<String, String>,
}

impl StaticPrincipal {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.claims.insert(name.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_session(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.session.insert(key.into(), value.to_string());
        self
    }
}

impl Principal for StaticPrincipal {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn claim(&self, name: &str) -> Option<String> {
        self.claims.get(name).cloned()
    }

    fn session_value(&self, key: &str) -> Option<String> {
        self.session.get(key).cloned()
    }
}

/// Where the scoping column lives relative to the queried entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRule {
    /// Column path, dotted through relation names for multi-hop matches
    pub path: String,
    pub field_type: FieldType,
}

impl ScopeRule {
    /// Number of relation hops between the entity and the column.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.matches('.').count()
    }
}

/// A rule together with the principal's value for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScope {
    pub rule: ScopeRule,
    /// `Null` when the principal carries no value, which matches no rows
    pub value: ParamValue,
}

impl ResolvedScope {
    #[must_use]
    pub fn predicate(&self) -> Predicate {
        Predicate::Eq {
            field: Operand::column(self.rule.path.clone()),
            value: self.value.clone(),
        }
    }

    /// `<path> = @ScopeValue` and its parameter, or a bare `FALSE` when there is no value.
    #[must_use]
    pub fn to_sql(&self) -> (String, ParamMap) {
        if matches!(self.value, ParamValue::Null) {
            return ("FALSE".to_string(), ParamMap::new());
        }
        let mut params = ParamMap::new();
        let sql = self.predicate().to_sql(&mut |value| {
            params.insert(SCOPE_PARAM, value);
            param_ref(SCOPE_PARAM)
        });
        (sql, params)
    }
}

/// Find the scoping column for `entity`, following relations when needed.
#[must_use]
pub fn resolve_scope_rule(
    registry: &SchemaRegistry,
    entity: &EntityDef,
    config: &ScopeConfig,
) -> Option<ScopeRule> {
    let mut on_path = HashSet::from([entity.name]);
    walk(registry, entity, config, "", 0, &mut on_path)
}

fn walk(
    registry: &SchemaRegistry,
    entity: &EntityDef,
    config: &ScopeConfig,
    prefix: &str,
    depth: usize,
    on_path: &mut HashSet<&'static str>,
) -> Option<ScopeRule> {
    if let Some(field) = entity.find_scalar(&config.column) {
        return Some(ScopeRule {
            path: format!("{prefix}{}", field.name),
            field_type: field.field_type,
        });
    }
    if depth >= config.max_depth {
        return None;
    }

    let mut candidates: Vec<(&'static str, &EntityDef)> = entity
        .relations()
        .filter_map(|(field, target)| registry.get(target).map(|def| (field.name, def)))
        .filter(|(_, def)| def.scoped || config.identity_entities.iter().any(|n| n == def.name))
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(a.0));

    for (relation, target) in candidates {
        if !on_path.insert(target.name) {
            continue;
        }
        let found = walk(
            registry,
            target,
            config,
            &format!("{prefix}{relation}."),
            depth + 1,
            on_path,
        );
        on_path.remove(target.name);
        if found.is_some() {
            return found;
        }
    }
    None
}

/// The principal's scope value: the claim when authenticated, the session fallback otherwise.
#[must_use]
pub fn scope_value<P: Principal + ?Sized>(principal: &P, config: &ScopeConfig) -> Option<String> {
    if principal.is_authenticated() {
        principal.claim(&config.claim)
    } else {
        principal.session_value(&config.session_key)
    }
}

/// Resolve the rule and the principal's value. `None` means the entity is unscoped.
pub fn resolve_scope<P: Principal + ?Sized>(
    registry: &SchemaRegistry,
    entity: &EntityDef,
    config: &ScopeConfig,
    principal: &P,
) -> Option<ResolvedScope> {
    let Some(rule) = resolve_scope_rule(registry, entity, config) else {
        tracing::debug!(entity = entity.name, column = %config.column, "no scoping column reachable");
        return None;
    };

    let value = match scope_value(principal, config) {
        Some(raw) => coerce_scope_value(rule.field_type, &raw),
        None => {
            tracing::warn!(
                entity = entity.name,
                authenticated = principal.is_authenticated(),
                "principal has no scope value; the query will match no rows"
            );
            ParamValue::Null
        }
    };
    Some(ResolvedScope { rule, value })
}

fn coerce_scope_value(field_type: FieldType, raw: &str) -> ParamValue {
    let coerced = match field_type {
        FieldType::Integer | FieldType::BigInteger => raw.trim().parse().ok().map(ParamValue::Int),
        FieldType::Uuid => Uuid::parse_str(raw.trim()).ok().map(ParamValue::Uuid),
        _ => Some(ParamValue::Text(raw.to_string())),
    };
    coerced.unwrap_or_else(|| {
        tracing::warn!(value = raw, "scope value does not fit the scoping column");
        ParamValue::Null
    })
}
