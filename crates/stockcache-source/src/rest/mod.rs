//! HTTP record source for a PostgREST-style API.
//!
//! Products are read from `GET {base}/products` with their variants embedded;
//! variant rows are read from `GET {base}/product_variants`. Filters use the
//! PostgREST operator syntax (`eq.`, `in.(…)`).

mod rows;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use stockcache_core::{Product, ProductFilter, VariantRecord};
use uuid::Uuid;

use crate::error::SourceError;
use crate::RecordSource;

use rows::{ProductRow, VariantRow, VARIANT_COLUMNS};

const PRODUCTS_TABLE: &str = "products";
const VARIANTS_TABLE: &str = "product_variants";

/// Record source backed by a PostgREST endpoint.
///
/// Use [`RestRecordSource::new`] with the API root (e.g.
/// `https://db.example.com/rest/v1`). Point it at a mock server in tests.
pub struct RestRecordSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RestRecordSource {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// When `api_key` is set it is sent both as the `apikey` header and as a
    /// bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SourceError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `Url::join` appends the table name
        // instead of replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            api_key: api_key.map(str::to_owned),
        })
    }

    fn build_url(&self, table: &str, params: &[(&str, &str)]) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join(table)
            .map_err(|e| SourceError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET request and decodes a JSON body, mapping statuses onto
    /// [`SourceError`] variants.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T, SourceError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Formats ids as a PostgREST `in.(…)` filter value.
fn in_filter(ids: &[Uuid]) -> String {
    let joined = ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

#[async_trait]
impl RecordSource for RestRecordSource {
    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, SourceError> {
        let select = format!(
            "id,name,is_active,is_featured,category_id,supplier_id,variants:{VARIANTS_TABLE}({VARIANT_COLUMNS})"
        );
        let category = filter.category.map(|id| format!("eq.{id}"));
        let supplier = filter.supplier.map(|id| format!("eq.{id}"));

        let mut params = vec![("select", select.as_str())];
        if let Some(c) = &category {
            params.push(("category_id", c.as_str()));
        }
        if let Some(s) = &supplier {
            params.push(("supplier_id", s.as_str()));
        }

        let url = self.build_url(PRODUCTS_TABLE, &params)?;
        let rows: Vec<ProductRow> = self.get_json(url, "products").await?;
        tracing::debug!(count = rows.len(), ?filter, "fetched products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn query_variants_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<VariantRecord>, SourceError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = in_filter(product_ids);
        let url = self.build_url(
            VARIANTS_TABLE,
            &[
                ("select", VARIANT_COLUMNS),
                ("product_id", ids.as_str()),
                ("order", "selling_price.asc"),
            ],
        )?;
        let rows: Vec<VariantRow> = self.get_json(url, "product_variants by product_id").await?;
        rows.into_iter()
            .map(|row| row.into_record("product_variants by product_id"))
            .collect()
    }

    async fn query_variant_by_sku(&self, sku: &str) -> Result<Option<VariantRecord>, SourceError> {
        let sku_filter = format!("eq.{sku}");
        let url = self.build_url(
            VARIANTS_TABLE,
            &[
                ("select", VARIANT_COLUMNS),
                ("sku", sku_filter.as_str()),
                ("limit", "1"),
            ],
        )?;
        let rows: Vec<VariantRow> = match self.get_json(url, "product_variants by sku").await {
            Ok(rows) => rows,
            Err(SourceError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        rows.into_iter()
            .next()
            .map(|row| row.into_record("product_variants by sku"))
            .transpose()
    }
}
