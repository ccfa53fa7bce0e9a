//! Stock valuation: folds product and variant records into a [`MetricsSnapshot`].
//!
//! Everything here is pure. Missing numeric fields arrive as zero (see the
//! `serde(default)` attributes on [`Variant`](crate::Variant)), so the engine
//! has no error path and an empty product list yields an all-zero snapshot.
//!
//! ## Classification rules
//!
//! | Product stock (sum over variants) | Counted as          |
//! |-----------------------------------|---------------------|
//! | `<= 0`                            | out of stock        |
//! | `1 ..= LOW_STOCK_THRESHOLD`       | low stock           |
//! | `> LOW_STOCK_THRESHOLD`           | healthy             |
//!
//! Reorder alerts look at the **first** variant's `min_quantity` only. Other
//! variants' thresholds are ignored even when set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::products::Product;

/// Product stock at or below this (and above zero) counts as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Aggregate inventory figures for a set of products at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_stock: i64,
    pub total_cost_value: Decimal,
    pub total_retail_value: Decimal,
    pub total_products: usize,
    pub active_products: usize,
    pub featured_products: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub reorder_alert_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// All-zero snapshot, used when the record source cannot be reached.
    #[must_use]
    pub fn empty(computed_at: DateTime<Utc>) -> Self {
        Self {
            total_stock: 0,
            total_cost_value: Decimal::ZERO,
            total_retail_value: Decimal::ZERO,
            total_products: 0,
            active_products: 0,
            featured_products: 0,
            low_stock_count: 0,
            out_of_stock_count: 0,
            reorder_alert_count: 0,
            computed_at,
        }
    }

    #[must_use]
    pub fn inactive_products(&self) -> usize {
        self.total_products.saturating_sub(self.active_products)
    }

    /// Products that are neither low nor out of stock.
    #[must_use]
    pub fn healthy_stock_count(&self) -> usize {
        self.total_products
            .saturating_sub(self.low_stock_count)
            .saturating_sub(self.out_of_stock_count)
    }
}

/// Stock classification of a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    Low,
    Healthy,
}

/// Classifies one product by its summed variant quantity.
#[must_use]
pub fn stock_status(product: &Product) -> StockStatus {
    classify(product.total_stock())
}

fn classify(stock: i64) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= LOW_STOCK_THRESHOLD {
        StockStatus::Low
    } else {
        StockStatus::Healthy
    }
}

/// Returns `true` when the main variant has a threshold and stock is at or below it.
fn needs_reorder(product: &Product, stock: i64) -> bool {
    product
        .main_variant()
        .and_then(crate::products::Variant::reorder_threshold)
        .is_some_and(|threshold| stock <= threshold)
}

/// Computes a snapshot stamped with the current time.
#[must_use]
pub fn compute_metrics(products: &[Product]) -> MetricsSnapshot {
    compute_metrics_at(products, Utc::now())
}

/// Computes a snapshot stamped with `computed_at`.
///
/// The result does not depend on the order of `products`.
#[must_use]
pub fn compute_metrics_at(products: &[Product], computed_at: DateTime<Utc>) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot::empty(computed_at);
    snapshot.total_products = products.len();

    for product in products {
        let mut stock = 0i64;
        for variant in &product.variants {
            stock = stock.saturating_add(variant.quantity);
            let quantity = Decimal::from(variant.quantity);
            snapshot.total_cost_value = snapshot
                .total_cost_value
                .saturating_add(quantity.saturating_mul(variant.cost_price));
            snapshot.total_retail_value = snapshot
                .total_retail_value
                .saturating_add(quantity.saturating_mul(variant.selling_price));
        }
        snapshot.total_stock = snapshot.total_stock.saturating_add(stock);

        if product.is_active {
            snapshot.active_products += 1;
        }
        if product.is_featured {
            snapshot.featured_products += 1;
        }

        match classify(stock) {
            StockStatus::OutOfStock => snapshot.out_of_stock_count += 1,
            StockStatus::Low => snapshot.low_stock_count += 1,
            StockStatus::Healthy => {}
        }

        if needs_reorder(product, stock) {
            snapshot.reorder_alert_count += 1;
        }
    }

    snapshot
}

#[cfg(test)]
#[path = "valuation_test.rs"]
mod tests;
