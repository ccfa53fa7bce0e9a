//! Integration tests for `MetricsCache` against an in-memory record source.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{catalog, id, variant, SpySource};
use rust_decimal::Decimal;
use stockcache_cache::{CacheStats, MetricsCache, MetricsCacheConfig};
use stockcache_core::{Product, ProductFilter, Scope};

fn cache(spy: &Arc<SpySource>) -> MetricsCache {
    MetricsCache::new(spy.clone(), MetricsCacheConfig::default())
}

fn categorised(n: u128, category: u128, quantity: i64) -> Product {
    Product {
        id: id(n),
        name: format!("product {n}"),
        is_active: true,
        is_featured: false,
        category_id: Some(id(category)),
        supplier_id: None,
        variants: vec![variant(
            id(n * 100),
            &format!("SKU-{n}"),
            quantity,
            Decimal::ONE,
            Decimal::TWO,
        )],
    }
}

#[tokio::test(start_paused = true)]
async fn second_get_within_ttl_returns_identical_snapshot() {
    let spy = Arc::new(SpySource::new(catalog(1..=3)));
    let cache = cache(&spy);

    let first = cache.get(&Scope::Global).await.unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    let second = cache.get(&Scope::Global).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.computed_at, second.computed_at);
    assert_eq!(spy.product_query_count(), 1);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            fetches: 1
        }
    );
}

#[tokio::test]
async fn snapshot_matches_the_two_product_scenario() {
    let in_stock = Product {
        variants: vec![variant(
            id(10),
            "A",
            5,
            Decimal::from(10),
            Decimal::ZERO,
        )],
        ..catalog(1..=1).remove(0)
    };
    let empty = Product {
        variants: vec![variant(id(20), "B", 0, Decimal::ZERO, Decimal::ZERO)],
        ..catalog(2..=2).remove(0)
    };
    let spy = Arc::new(SpySource::new(vec![in_stock, empty]));

    let snapshot = cache(&spy).get(&Scope::Global).await.unwrap();

    assert_eq!(snapshot.total_stock, 5);
    assert_eq!(snapshot.total_cost_value, Decimal::from(50));
    assert_eq!(snapshot.out_of_stock_count, 1);
    assert_eq!(snapshot.low_stock_count, 1);
    assert_eq!(snapshot.total_products, 2);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_recomputed() {
    let spy = Arc::new(SpySource::new(catalog(1..=2)));
    let cache = cache(&spy);

    cache.get(&Scope::Global).await.unwrap();
    tokio::time::advance(Duration::from_millis(30_000)).await;
    cache.get(&Scope::Global).await.unwrap();

    assert_eq!(spy.product_query_count(), 2);
}

#[tokio::test]
async fn invalidate_forces_a_fresh_fetch() {
    let spy = Arc::new(SpySource::new(catalog(1..=2)));
    let cache = cache(&spy);

    let before = cache.get(&Scope::Global).await.unwrap();
    cache.invalidate(Some(&Scope::Global));
    let after = cache.get(&Scope::Global).await.unwrap();

    assert_eq!(spy.product_query_count(), 2);
    assert!(after.computed_at >= before.computed_at);
}

#[tokio::test]
async fn invalidating_one_scope_keeps_the_others() {
    let spy = Arc::new(SpySource::new(vec![
        categorised(1, 7, 3),
        categorised(2, 8, 20),
    ]));
    let cache = cache(&spy);
    let category = Scope::Category(id(7));

    cache.get(&Scope::Global).await.unwrap();
    cache.get(&category).await.unwrap();
    cache.invalidate(Some(&category));

    cache.get(&Scope::Global).await.unwrap();
    assert_eq!(spy.product_query_count(), 2, "global must still be cached");

    cache.get(&category).await.unwrap();
    assert_eq!(spy.product_query_count(), 3);
}

#[tokio::test]
async fn invalidate_all_clears_every_scope() {
    let spy = Arc::new(SpySource::new(vec![categorised(1, 7, 3)]));
    let cache = cache(&spy);
    let category = Scope::Category(id(7));

    cache.get(&Scope::Global).await.unwrap();
    cache.get(&category).await.unwrap();
    cache.invalidate(None);
    cache.get(&Scope::Global).await.unwrap();
    cache.get(&category).await.unwrap();

    assert_eq!(spy.product_query_count(), 4);
}

#[tokio::test]
async fn scoped_get_passes_the_scope_filter() {
    let spy = Arc::new(SpySource::new(vec![
        categorised(1, 7, 3),
        categorised(2, 7, 0),
        categorised(3, 8, 50),
    ]));
    let cache = cache(&spy);

    let snapshot = cache.get(&Scope::Category(id(7))).await.unwrap();

    assert_eq!(
        spy.product_filters(),
        vec![ProductFilter {
            category: Some(id(7)),
            supplier: None
        }]
    );
    assert_eq!(snapshot.total_products, 2);
    assert_eq!(snapshot.total_stock, 3);
    assert_eq!(snapshot.out_of_stock_count, 1);
}

#[tokio::test]
async fn source_failure_surfaces_and_is_not_cached() {
    let spy = Arc::new(SpySource::new(catalog(1..=2)));
    let cache = cache(&spy);

    spy.set_fail_products(true);
    let err = cache.get(&Scope::Global).await.unwrap_err();
    assert!(err.is_remote_unavailable(), "got: {err:?}");

    spy.set_fail_products(false);
    let snapshot = cache.get(&Scope::Global).await.unwrap();
    assert_eq!(snapshot.total_products, 2);
    assert_eq!(spy.product_query_count(), 2);
}

#[tokio::test]
async fn get_or_empty_degrades_to_zeroes() {
    let spy = Arc::new(SpySource::new(catalog(1..=2)));
    let cache = cache(&spy);
    spy.set_fail_products(true);

    let snapshot = cache.get_or_empty(&Scope::Global).await;
    assert_eq!(snapshot.total_products, 0);
    assert_eq!(snapshot.total_stock, 0);
    assert_eq!(snapshot.total_retail_value, Decimal::ZERO);

    spy.set_fail_products(false);
    let recovered = cache.get_or_empty(&Scope::Global).await;
    assert_eq!(recovered.total_products, 2, "empty snapshot must not be cached");
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_share_one_fetch() {
    let spy = Arc::new(SpySource::new(catalog(1..=3)).with_latency(Duration::from_millis(200)));
    let cache = cache(&spy);

    let (a, b) = tokio::join!(cache.get(&Scope::Global), cache.get(&Scope::Global));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(spy.product_query_count(), 1);
    assert_eq!(cache.stats().misses, 2);
    assert_eq!(cache.stats().fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn invalidation_during_a_fetch_discards_its_result() {
    let spy = Arc::new(SpySource::new(catalog(1..=3)).with_latency(Duration::from_millis(200)));
    let cache = cache(&spy);

    let background = cache.clone();
    let pending = tokio::spawn(async move { background.get(&Scope::Global).await });
    while spy.product_query_count() == 0 {
        tokio::task::yield_now().await;
    }

    cache.invalidate(None);
    let stale = pending.await.unwrap().unwrap();
    assert_eq!(stale.total_products, 3, "the original caller still gets its answer");

    cache.get(&Scope::Global).await.unwrap();
    assert_eq!(spy.product_query_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidating_another_scope_during_a_fetch_keeps_its_result() {
    let spy = Arc::new(
        SpySource::new(vec![categorised(1, 7, 3)]).with_latency(Duration::from_millis(200)),
    );
    let cache = cache(&spy);

    let background = cache.clone();
    let pending = tokio::spawn(async move { background.get(&Scope::Global).await });
    while spy.product_query_count() == 0 {
        tokio::task::yield_now().await;
    }

    cache.invalidate(Some(&Scope::Category(id(7))));
    pending.await.unwrap().unwrap();

    cache.get(&Scope::Global).await.unwrap();
    assert_eq!(spy.product_query_count(), 1, "global result must have been stored");
}
