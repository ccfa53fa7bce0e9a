use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filter dimension that inventory metrics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Category(Uuid),
    Supplier(Uuid),
}

impl Scope {
    /// The record-source filter selecting this scope's products.
    #[must_use]
    pub fn filter(&self) -> ProductFilter {
        match *self {
            Scope::Global => ProductFilter::default(),
            Scope::Category(id) => ProductFilter {
                category: Some(id),
                supplier: None,
            },
            Scope::Supplier(id) => ProductFilter {
                category: None,
                supplier: Some(id),
            },
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Category(id) => write!(f, "category:{id}"),
            Scope::Supplier(id) => write!(f, "supplier:{id}"),
        }
    }
}

/// Product query filter understood by record sources. Empty means all products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub supplier: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_scope_has_empty_filter() {
        assert_eq!(Scope::Global.filter(), ProductFilter::default());
    }

    #[test]
    fn category_scope_filters_by_category_only() {
        let id = Uuid::new_v4();
        let filter = Scope::Category(id).filter();
        assert_eq!(filter.category, Some(id));
        assert!(filter.supplier.is_none());
    }

    #[test]
    fn display_names_scope_kind() {
        let id = Uuid::nil();
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(
            Scope::Supplier(id).to_string(),
            "supplier:00000000-0000-0000-0000-000000000000"
        );
    }
}
