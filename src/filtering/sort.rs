//! `order_by` parsing: `name, created_at desc, customer.name asc`.

use super::compiler::FieldSet;
use crate::errors::{FilterWarning, WarningKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Column path as it appears in SQL (prefix included)
    pub path: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSort {
    pub keys: Vec<SortKey>,
    pub warnings: Vec<FilterWarning>,
}

impl ParsedSort {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `ORDER BY` body, `None` when no key survived.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        Some(
            self.keys
                .iter()
                .map(|key| {
                    let direction = if key.descending { "DESC" } else { "ASC" };
                    format!("{} {direction}", key.path)
                })
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Parse a comma-separated `order_by` list.
///
/// Undotted fields must name a scalar property and get `join_prefix` prepended when one is
/// configured; dotted fields must be plain identifiers on every segment and are kept as given.
pub fn parse_order_by<F: FieldSet + ?Sized>(
    fields: &F,
    order_by: &str,
    join_prefix: Option<&str>,
) -> ParsedSort {
    let mut parsed = ParsedSort::default();

    for entry in order_by.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_entry(fields, entry, join_prefix) {
            Some(key) => parsed.keys.push(key),
            None => {
                tracing::debug!(entry, "order_by entry ignored");
                parsed
                    .warnings
                    .push(FilterWarning::new(entry, WarningKind::UnknownSortField));
            }
        }
    }

    parsed
}

fn parse_entry<F: FieldSet + ?Sized>(
    fields: &F,
    entry: &str,
    join_prefix: Option<&str>,
) -> Option<SortKey> {
    let mut words = entry.split_whitespace();
    let field = words.next()?;
    let descending = match words.next() {
        None => false,
        Some(word) if word.eq_ignore_ascii_case("asc") => false,
        Some(word) if word.eq_ignore_ascii_case("desc") => true,
        Some(_) => return None,
    };
    if words.next().is_some() {
        return None;
    }

    let path = if field.contains('.') {
        field
            .split('.')
            .all(is_identifier)
            .then(|| field.to_string())?
    } else {
        let (column, _) = fields.resolve(field)?;
        match join_prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}.{column}"),
            None => column,
        }
    };

    Some(SortKey { path, descending })
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityDef, FieldDef, FieldType};

    fn order() -> EntityDef {
        EntityDef {
            name: "Order",
            table: "orders",
            fields: vec![
                FieldDef::new("id", FieldType::Integer),
                FieldDef::new("created_at", FieldType::DateTime),
            ],
            scoped: false,
        }
    }

    #[test]
    fn test_directions() {
        let parsed = parse_order_by(&order(), "createdAt desc, id", None);
        assert_eq!(parsed.to_sql().as_deref(), Some("created_at DESC, id ASC"));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_join_prefix_applies_to_undotted_fields() {
        let parsed = parse_order_by(&order(), "id, customer.name desc", Some("o"));
        assert_eq!(parsed.to_sql().as_deref(), Some("o.id ASC, customer.name DESC"));
    }

    #[test]
    fn test_unknown_and_unsafe_entries_are_dropped() {
        let parsed = parse_order_by(&order(), "nope, id sideways, a.b;drop, id", None);
        assert_eq!(parsed.to_sql().as_deref(), Some("id ASC"));
        assert_eq!(parsed.warnings.len(), 3);
        assert!(parsed.warnings.iter().all(|w| w.kind == WarningKind::UnknownSortField));
    }

    #[test]
    fn test_empty() {
        assert!(parse_order_by(&order(), " , ", None).to_sql().is_none());
    }
}
