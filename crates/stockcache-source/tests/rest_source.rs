//! Integration tests for `RestRecordSource`.
//!
//! Each test stands up a `wiremock` server so no real network traffic is
//! made. Covers product queries with scope filters, batched variant queries,
//! SKU lookups, and the status-to-error mapping.

use rust_decimal::Decimal;
use serde_json::json;
use stockcache_core::ProductFilter;
use stockcache_source::{RecordSource, RestRecordSource, SourceError};
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT_A: &str = "11111111-1111-4111-8111-111111111111";
const PRODUCT_B: &str = "22222222-2222-4222-8222-222222222222";
const CATEGORY: &str = "33333333-3333-4333-8333-333333333333";

fn test_source(server: &MockServer) -> RestRecordSource {
    RestRecordSource::new(&server.uri(), None, 5, "stockcache-test/0.1")
        .expect("failed to build test RestRecordSource")
}

fn variant_json(id: u128, product: &str, sku: &str, qty: i64, price: &str) -> serde_json::Value {
    json!({
        "id": Uuid::from_u128(id),
        "product_id": product,
        "name": format!("variant {id}"),
        "sku": sku,
        "quantity": qty,
        "cost_price": "4.00",
        "selling_price": price,
        "min_quantity": 2
    })
}

// ---------------------------------------------------------------------------
// query_products
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_products_parses_embedded_variants() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": PRODUCT_A,
                "name": "USB-C cable",
                "is_active": true,
                "is_featured": true,
                "category_id": CATEGORY,
                "supplier_id": null,
                "variants": [
                    variant_json(1, PRODUCT_A, "CBL-1M", 3, "9.99"),
                    variant_json(2, PRODUCT_A, "CBL-2M", 4, "12.50")
                ]
            },
            {
                "id": PRODUCT_B,
                "name": "Empty shelf",
                "is_active": false,
                "variants": []
            }
        ])))
        .mount(&server)
        .await;

    let products = test_source(&server)
        .query_products(&ProductFilter::default())
        .await
        .expect("query should succeed");

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].variants.len(), 2);
    assert_eq!(products[0].variants[1].selling_price, Decimal::new(1250, 2));
    assert_eq!(products[0].total_stock(), 7);
    assert!(products[0].is_featured);
    assert!(products[1].variants.is_empty());
    assert!(!products[1].is_active);
}

#[tokio::test]
async fn query_products_sends_category_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("category_id", format!("eq.{CATEGORY}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = ProductFilter {
        category: Some(CATEGORY.parse().unwrap()),
        supplier: None,
    };
    let products = test_source(&server)
        .query_products(&filter)
        .await
        .expect("query should succeed");
    assert!(products.is_empty());
}

#[tokio::test]
async fn api_key_is_sent_as_header_and_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let source = RestRecordSource::new(&server.uri(), Some("anon-key"), 5, "ua")
        .expect("client should build");
    source
        .query_products(&ProductFilter::default())
        .await
        .expect("query should succeed");
}

// ---------------------------------------------------------------------------
// query_variants_by_product_ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_variants_uses_in_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .and(query_param("product_id", format!("in.({PRODUCT_A},{PRODUCT_B})")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            variant_json(1, PRODUCT_A, "A-1", 1, "1.00"),
            variant_json(2, PRODUCT_B, "B-1", 2, "2.00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ids: [Uuid; 2] = [PRODUCT_A.parse().unwrap(), PRODUCT_B.parse().unwrap()];
    let records = test_source(&server)
        .query_variants_by_product_ids(&ids)
        .await
        .expect("query should succeed");

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].product_id, ids[1]);
    assert_eq!(records[1].sku, "B-1");
}

#[tokio::test]
async fn query_variants_with_no_ids_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let records = test_source(&server)
        .query_variants_by_product_ids(&[])
        .await
        .expect("empty input should short-circuit");
    assert!(records.is_empty());
}

#[tokio::test]
async fn server_error_is_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .query_variants_by_product_ids(&[PRODUCT_A.parse::<Uuid>().unwrap()])
        .await
        .expect_err("503 should fail");

    assert!(
        matches!(err, SourceError::UnexpectedStatus { status: 503, .. }),
        "got: {err:?}"
    );
    assert!(err.is_retriable());
}

#[tokio::test]
async fn not_found_is_not_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .query_variants_by_product_ids(&[PRODUCT_A.parse::<Uuid>().unwrap()])
        .await
        .expect_err("404 should fail");

    assert!(err.is_not_found());
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn malformed_body_is_a_contract_violation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": "object"})))
        .mount(&server)
        .await;

    let err = test_source(&server)
        .query_variants_by_product_ids(&[PRODUCT_A.parse::<Uuid>().unwrap()])
        .await
        .expect_err("object body should not decode as a list");

    assert!(err.is_contract_violation(), "got: {err:?}");
}

// ---------------------------------------------------------------------------
// query_variant_by_sku
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sku_lookup_returns_first_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .and(query_param("sku", "eq.CBL-1M"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([variant_json(9, PRODUCT_A, "CBL-1M", 5, "9.99")])),
        )
        .mount(&server)
        .await;

    let record = test_source(&server)
        .query_variant_by_sku("CBL-1M")
        .await
        .expect("query should succeed")
        .expect("record should exist");

    assert_eq!(record.id, Uuid::from_u128(9));
    assert_eq!(record.selling_price, Decimal::new(999, 2));
}

#[tokio::test]
async fn sku_lookup_with_no_rows_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product_variants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let record = test_source(&server)
        .query_variant_by_sku("NOPE")
        .await
        .expect("empty result is not an error");
    assert!(record.is_none());
}
