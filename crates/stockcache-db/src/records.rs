//! Postgres-backed [`RecordSource`] reading the `products` and
//! `product_variants` tables.
//!
//! All numeric columns are `COALESCE`d to zero in SQL so that nullable
//! quantities and prices never reach the valuation engine as errors.
//! Variant order within a product is `created_at, id`; the first row is the
//! product's main variant.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use stockcache_core::{Product, ProductFilter, Variant, VariantRecord};
use stockcache_source::{RecordSource, SourceError};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    is_active: bool,
    is_featured: bool,
    category_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    sku: String,
    quantity: i64,
    cost_price: Decimal,
    selling_price: Decimal,
    min_quantity: i64,
}

impl VariantRow {
    fn into_variant(self) -> Variant {
        Variant {
            id: self.id,
            sku: self.sku,
            name: self.name,
            quantity: self.quantity,
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            min_quantity: self.min_quantity,
        }
    }

    fn into_record(self) -> VariantRecord {
        VariantRecord {
            id: self.id,
            product_id: self.product_id,
            name: self.name,
            sku: self.sku,
            quantity: self.quantity,
            cost_price: self.cost_price,
            selling_price: self.selling_price,
        }
    }
}

const VARIANT_SELECT: &str = "SELECT id, product_id, \
         COALESCE(name, '') AS name, \
         COALESCE(sku, '') AS sku, \
         COALESCE(quantity, 0)::BIGINT AS quantity, \
         COALESCE(cost_price, 0)::NUMERIC AS cost_price, \
         COALESCE(selling_price, 0)::NUMERIC AS selling_price, \
         COALESCE(min_quantity, 0)::BIGINT AS min_quantity \
     FROM product_variants";

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// SQLSTATE classes that indicate a transient condition: connection
/// exceptions (08), transaction rollbacks (40), insufficient resources (53)
/// and operator intervention such as query cancellation (57).
const TRANSIENT_SQLSTATE_CLASSES: [&str; 4] = ["08", "40", "53", "57"];

fn map_sqlx_error(context: &str, err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::RowNotFound => SourceError::NotFound(context.to_owned()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => SourceError::ContractViolation {
            context: context.to_owned(),
            reason: err.to_string(),
        },
        sqlx::Error::Database(ref db_err) => {
            let transient = db_err
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATE_CLASSES.iter().any(|c| code.starts_with(*c)));
            if transient {
                SourceError::Unavailable(format!("{context}: {err}"))
            } else {
                SourceError::ContractViolation {
                    context: context.to_owned(),
                    reason: err.to_string(),
                }
            }
        }
        other => SourceError::Unavailable(format!("{context}: {other}")),
    }
}

// ---------------------------------------------------------------------------
// PgRecordSource
// ---------------------------------------------------------------------------

/// Record source reading directly from Postgres through a shared pool.
#[derive(Debug, Clone)]
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn variants_for(&self, product_ids: &[Uuid]) -> Result<Vec<VariantRow>, sqlx::Error> {
        sqlx::query_as::<_, VariantRow>(&format!(
            "{VARIANT_SELECT} WHERE product_id = ANY($1) ORDER BY product_id, created_at, id"
        ))
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, SourceError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, \
                    COALESCE(name, '') AS name, \
                    COALESCE(is_active, FALSE) AS is_active, \
                    COALESCE(is_featured, FALSE) AS is_featured, \
                    category_id, \
                    supplier_id \
             FROM products \
             WHERE ($1::UUID IS NULL OR category_id = $1) \
               AND ($2::UUID IS NULL OR supplier_id = $2) \
             ORDER BY name, id",
        )
        .bind(filter.category)
        .bind(filter.supplier)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("products", e))?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut by_product: HashMap<Uuid, Vec<Variant>> = HashMap::new();
        if !ids.is_empty() {
            for row in self
                .variants_for(&ids)
                .await
                .map_err(|e| map_sqlx_error("product_variants", e))?
            {
                by_product
                    .entry(row.product_id)
                    .or_default()
                    .push(row.into_variant());
            }
        }

        tracing::debug!(count = rows.len(), ?filter, "fetched products from postgres");

        Ok(rows
            .into_iter()
            .map(|row| Product {
                variants: by_product.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                is_active: row.is_active,
                is_featured: row.is_featured,
                category_id: row.category_id,
                supplier_id: row.supplier_id,
            })
            .collect())
    }

    async fn query_variants_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<VariantRecord>, SourceError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .variants_for(product_ids)
            .await
            .map_err(|e| map_sqlx_error("product_variants by product_id", e))?;
        Ok(rows.into_iter().map(VariantRow::into_record).collect())
    }

    async fn query_variant_by_sku(&self, sku: &str) -> Result<Option<VariantRecord>, SourceError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "{VARIANT_SELECT} WHERE sku = $1 ORDER BY created_at, id LIMIT 1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_variants by sku", e))?;
        Ok(row.map(VariantRow::into_record))
    }
}
