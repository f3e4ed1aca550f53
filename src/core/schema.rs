//! Startup-time schema registry.
//!
//! Every queryable entity describes its properties once, explicitly: name, semantic type and
//! whether it is a relation. The filter compiler, the scope resolver and the materializer all
//! read this description instead of inspecting types at runtime.

use heck::ToSnakeCase;
use std::collections::HashMap;

use super::traits::QueryResource;

/// Semantic type of a property, as far as filtering and rendering care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    /// 32-bit integer column (`int4`)
    Integer,
    /// 64-bit integer column (`int8`)
    BigInteger,
    Float,
    Decimal,
    Boolean,
    /// Calendar date (`date`)
    Date,
    /// Timestamp with time zone (`timestamptz`)
    DateTime,
    Uuid,
    /// Free-form JSON; the filter compiler infers comparisons from the value
    Json,
    TextList,
    IntegerList,
    /// Foreign-key navigation to another registered entity
    Relation { target: &'static str },
    /// One-to-many navigation; never filterable
    Collection { target: &'static str },
    /// Reserved storage-typed column (blobs, search vectors); never filterable
    Storage,
}

impl FieldType {
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        !matches!(
            self,
            Self::Relation { .. } | Self::Collection { .. } | Self::Storage
        )
    }

    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Text)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Integer | Self::BigInteger | Self::Float | Self::Decimal
        )
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::TextList | Self::IntegerList)
    }

    #[must_use]
    pub const fn relation_target(self) -> Option<&'static str> {
        match self {
            Self::Relation { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name (snake case); relation fields use the navigation name
    pub name: &'static str,
    pub field_type: FieldType,
}

impl FieldDef {
    #[must_use]
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }

    #[must_use]
    pub const fn relation(name: &'static str, target: &'static str) -> Self {
        Self::new(name, FieldType::Relation { target })
    }

    /// True when `candidate` names this field, ignoring case style (`CompanyId`, `companyId`,
    /// `company_id` all match `company_id`).
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.name == candidate || normalize_name(self.name) == normalize_name(candidate)
    }
}

/// Snake-case normalisation used for every field-name comparison.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_snake_case()
}

/// Everything the query layer knows about one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: Vec<FieldDef>,
    /// The entity carries the "has scope" capability and is followed by the scope resolver
    pub scoped: bool,
}

impl EntityDef {
    /// Properties that can be filtered, sorted and projected.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.field_type.is_scalar())
    }

    #[must_use]
    pub fn find_scalar(&self, name: &str) -> Option<&FieldDef> {
        self.scalar_fields().find(|f| f.matches(name))
    }

    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.matches(name))
    }

    pub fn relations(&self) -> impl Iterator<Item = (&FieldDef, &'static str)> {
        self.fields
            .iter()
            .filter_map(|f| f.field_type.relation_target().map(|target| (f, target)))
    }

    /// `SELECT <scalar columns> FROM <table>`, the projection both output modes render.
    #[must_use]
    pub fn default_select(&self) -> String {
        let columns = self
            .scalar_fields()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {columns} FROM {}", self.table)
    }
}

/// Entity definitions keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<&'static str, EntityDef>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: QueryResource>(&mut self) -> &mut Self {
        self.register_entity(R::entity_def())
    }

    pub fn register_entity(&mut self, def: EntityDef) -> &mut Self {
        if self.entities.insert(def.name, def).is_some() {
            tracing::debug!("replaced an existing entity registration");
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Register several resources at once.
///
/// Usage: `register_resources!(registry, Order, Customer, Company)`
#[macro_export]
macro_rules! register_resources {
    ($registry:expr, $($resource:ty),+ $(,)?) => {
        $(
            $registry.register::<$resource>();
        )+
    };
}
