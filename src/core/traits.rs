use super::schema::{EntityDef, FieldDef};

/// An entity that can be listed through the query engine.
///
/// Implementations describe their properties once; everything else has a default.
///
/// ```rust,ignore
/// pub struct Order;
///
/// impl QueryResource for Order {
///     const RESOURCE_NAME: &'static str = "Order";
///     const TABLE_NAME: &'static str = "orders";
///
///     fn fields() -> Vec<FieldDef> {
///         vec![
///             FieldDef::new("id", FieldType::Integer),
///             FieldDef::new("name", FieldType::Text),
///             FieldDef::new("active", FieldType::Boolean),
///         ]
///     }
/// }
/// ```
pub trait QueryResource: Send + Sync {
    /// Registry key; relation fields of other entities point at this name
    const RESOURCE_NAME: &'static str;
    const TABLE_NAME: &'static str;
    /// Whether the entity carries the "has scope" capability
    const SCOPED: bool = false;

    fn fields() -> Vec<FieldDef>;

    #[must_use]
    fn entity_def() -> EntityDef {
        EntityDef {
            name: Self::RESOURCE_NAME,
            table: Self::TABLE_NAME,
            fields: Self::fields(),
            scoped: Self::SCOPED,
        }
    }

    /// Base `SELECT` without a `WHERE` clause.
    ///
    /// Override when the listing needs joins, e.g. when the scoping column lives on a related
    /// table and the relation is aliased by its navigation name.
    #[must_use]
    fn base_query() -> String {
        Self::entity_def().default_select()
    }

    /// Optional `GROUP BY` body appended by the plan assembler.
    #[must_use]
    fn group_by() -> Option<String> {
        None
    }

    /// `ORDER BY` body used when the request has no `order_by`.
    #[must_use]
    fn default_order() -> Option<String> {
        None
    }
}
