use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog product with its sellable variants, as reported by the record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    /// Source order is preserved; the first entry is the product's main variant.
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    /// Sum of all variant quantities. Saturates instead of overflowing.
    #[must_use]
    pub fn total_stock(&self) -> i64 {
        self.variants
            .iter()
            .fold(0i64, |acc, v| acc.saturating_add(v.quantity))
    }

    /// The first variant in source order, if any.
    #[must_use]
    pub fn main_variant(&self) -> Option<&Variant> {
        self.variants.first()
    }
}

/// A sellable SKU-level unit of a [`Product`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub selling_price: Decimal,
    /// Reorder threshold. `0` means no threshold is configured.
    #[serde(default)]
    pub min_quantity: i64,
}

impl Variant {
    /// Returns the reorder threshold when one is configured.
    #[must_use]
    pub fn reorder_threshold(&self) -> Option<i64> {
        (self.min_quantity > 0).then_some(self.min_quantity)
    }
}

/// Flat variant row returned by per-product-id and per-SKU variant queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub selling_price: Decimal,
}

/// Price information for one variant, as served by the price cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub selling_price: Decimal,
    pub cost_price: Decimal,
    pub quantity: i64,
}

impl From<VariantRecord> for PriceRecord {
    fn from(record: VariantRecord) -> Self {
        Self {
            product_id: record.product_id,
            variant_id: record.id,
            sku: record.sku,
            name: record.name,
            selling_price: record.selling_price,
            cost_price: record.cost_price,
            quantity: record.quantity,
        }
    }
}
