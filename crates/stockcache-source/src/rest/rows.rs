//! Raw row shapes returned by the PostgREST endpoints.
//!
//! Nullable columns come back as JSON `null` rather than being omitted, so
//! every non-key field is an `Option` here and collapses to zero/empty when
//! converted into the core types.

use rust_decimal::Decimal;
use serde::Deserialize;
use stockcache_core::{Product, Variant, VariantRecord};
use uuid::Uuid;

use crate::error::SourceError;

/// Columns selected for variant rows, both embedded and standalone.
pub(super) const VARIANT_COLUMNS: &str =
    "id,product_id,name,sku,quantity,cost_price,selling_price,min_quantity";

#[derive(Debug, Deserialize)]
pub(super) struct ProductRow {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    /// Embedded `product_variants` rows. `null` when the embed is empty on
    /// some PostgREST versions.
    #[serde(default)]
    pub variants: Option<Vec<VariantRow>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VariantRow {
    pub id: Uuid,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub min_quantity: Option<i64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            is_active: row.is_active.unwrap_or(false),
            is_featured: row.is_featured.unwrap_or(false),
            category_id: row.category_id,
            supplier_id: row.supplier_id,
            variants: row
                .variants
                .unwrap_or_default()
                .into_iter()
                .map(Variant::from)
                .collect(),
        }
    }
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            sku: row.sku.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            quantity: row.quantity.unwrap_or(0),
            cost_price: row.cost_price.unwrap_or_default(),
            selling_price: row.selling_price.unwrap_or_default(),
            min_quantity: row.min_quantity.unwrap_or(0),
        }
    }
}

impl VariantRow {
    /// Converts a standalone variant row. These rows must carry `product_id`.
    pub(super) fn into_record(self, context: &str) -> Result<VariantRecord, SourceError> {
        let product_id = self
            .product_id
            .ok_or_else(|| SourceError::ContractViolation {
                context: context.to_owned(),
                reason: format!("variant {} has no product_id", self.id),
            })?;
        Ok(VariantRecord {
            id: self.id,
            product_id,
            name: self.name.unwrap_or_default(),
            sku: self.sku.unwrap_or_default(),
            quantity: self.quantity.unwrap_or(0),
            cost_price: self.cost_price.unwrap_or_default(),
            selling_price: self.selling_price.unwrap_or_default(),
        })
    }
}
