//! Normalization of raw API records into flat bronze relations
//!
//! Each run gets one [`BatchContext`] whose `_ingestion_ts` / `_batch_id`
//! pair is stamped on every row it produces, across all relations, so a
//! whole batch can be traced together afterwards.
//!
//! Field policy: natural keys are required (a record without its key is an
//! upstream contract break), everything else is an explicit `Option` or
//! empty list — an absent optional field is a typed null, never a failure.

use chrono::{DateTime, Timelike, Utc};
use rdp_common::{RdpError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Provenance shared by every row normalized in one run
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Fresh random identifier for this run
    pub batch_id: Uuid,
    /// Fetch time, UTC, truncated to the second
    pub ingestion_ts: DateTime<Utc>,
}

impl BatchContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            // Second resolution, matching the snapshot filename clock
            ingestion_ts: now.with_nanosecond(0).unwrap_or(now),
        }
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Bronze / silver row shapes
// ============================================================================

/// One row of `silver.products` (key: `product_sku`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product_sku: String,
    pub description: Option<String>,
    pub unit_amount: Option<f64>,
    pub supplier: Option<String>,
    #[serde(rename = "_ingestion_ts")]
    pub ingestion_ts: DateTime<Utc>,
    #[serde(rename = "_batch_id")]
    pub batch_id: Uuid,
}

/// One row of `silver.customers` (key: `customer_id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub customer_id: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(rename = "_ingestion_ts")]
    pub ingestion_ts: DateTime<Utc>,
    #[serde(rename = "_batch_id")]
    pub batch_id: Uuid,
}

/// One row of `silver.sales_customer` (key: `id`), one per sale header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleHeaderRow {
    pub id: i64,
    pub datetime: Option<DateTime<Utc>>,
    pub total_amount: Option<f64>,
    pub customer_id: Option<String>,
    #[serde(rename = "_ingestion_ts")]
    pub ingestion_ts: DateTime<Utc>,
    #[serde(rename = "_batch_id")]
    pub batch_id: Uuid,
}

/// One row of `silver.sales_product` (key: `(sale_id, line_no)`),
/// one per nested line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLineRow {
    pub sale_id: i64,
    /// 1-based position within the parent sale's nested list; restarts at 1
    /// for every sale header
    pub line_no: i32,
    pub product_sku: Option<String>,
    pub quantity: Option<i32>,
    pub amount: Option<f64>,
    #[serde(rename = "_ingestion_ts")]
    pub ingestion_ts: DateTime<Utc>,
    #[serde(rename = "_batch_id")]
    pub batch_id: Uuid,
}

// ============================================================================
// Wire shapes (as returned by the upstream API)
// ============================================================================

#[derive(Deserialize)]
struct WireProduct {
    product_sku: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    unit_amount: Option<f64>,
    #[serde(default)]
    supplier: Option<String>,
}

#[derive(Deserialize)]
struct WireCustomer {
    customer_id: String,
    #[serde(default)]
    emails: Vec<String>,
    #[serde(default)]
    phone_numbers: Vec<String>,
}

#[derive(Deserialize)]
struct WireSaleLine {
    #[serde(default)]
    product_sku: Option<String>,
    #[serde(default)]
    quantity: Option<i32>,
    #[serde(default)]
    amount: Option<f64>,
}

#[derive(Deserialize)]
struct WireSale {
    id: i64,
    #[serde(default)]
    datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    total_amount: Option<f64>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    items: Vec<WireSaleLine>,
}

fn decode<T: serde::de::DeserializeOwned>(record: &Value, relation: &str) -> Result<T> {
    serde_json::from_value(record.clone()).map_err(|e| {
        RdpError::shape(format!("malformed {relation} record: {e}"))
    })
}

// ============================================================================
// Normalizers
// ============================================================================

/// One output row per input product record
pub fn normalize_products(items: &[Value], ctx: &BatchContext) -> Result<Vec<ProductRow>> {
    items
        .iter()
        .map(|record| {
            let wire: WireProduct = decode(record, "product")?;
            Ok(ProductRow {
                product_sku: wire.product_sku,
                description: wire.description,
                unit_amount: wire.unit_amount,
                supplier: wire.supplier,
                ingestion_ts: ctx.ingestion_ts,
                batch_id: ctx.batch_id,
            })
        })
        .collect()
}

/// One output row per input customer record
pub fn normalize_customers(items: &[Value], ctx: &BatchContext) -> Result<Vec<CustomerRow>> {
    items
        .iter()
        .map(|record| {
            let wire: WireCustomer = decode(record, "customer")?;
            Ok(CustomerRow {
                customer_id: wire.customer_id,
                emails: wire.emails,
                phone_numbers: wire.phone_numbers,
                ingestion_ts: ctx.ingestion_ts,
                batch_id: ctx.batch_id,
            })
        })
        .collect()
}

/// Split sale records into two aligned relations: one header row per sale
/// and one line row per nested item, numbered 1..k in source-list order
pub fn normalize_sales(
    items: &[Value],
    ctx: &BatchContext,
) -> Result<(Vec<SaleHeaderRow>, Vec<SaleLineRow>)> {
    let mut headers = Vec::with_capacity(items.len());
    let mut lines = Vec::new();

    for record in items {
        let wire: WireSale = decode(record, "sale")?;

        for (idx, item) in wire.items.iter().enumerate() {
            lines.push(SaleLineRow {
                sale_id: wire.id,
                line_no: idx as i32 + 1,
                product_sku: item.product_sku.clone(),
                quantity: item.quantity,
                amount: item.amount,
                ingestion_ts: ctx.ingestion_ts,
                batch_id: ctx.batch_id,
            });
        }

        headers.push(SaleHeaderRow {
            id: wire.id,
            datetime: wire.datetime,
            total_amount: wire.total_amount,
            customer_id: wire.customer_id,
            ingestion_ts: ctx.ingestion_ts,
            batch_id: ctx.batch_id,
        });
    }

    Ok((headers, lines))
}
