//! Pricing and machine-type catalogs.
//!
//! The billing catalog comes from the Cloud Billing `services.skus.list`
//! API. Each SKU is reduced to its first pricing expression: the tier list
//! and the factor converting the billed usage unit (hour, GiB-month, ...)
//! into the base unit (second, byte-second, ...).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CostError, Result};

/// One price bracket of a SKU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Usage amount at which this tier starts, in the SKU's usage unit
    pub start_usage_amount: f64,
    /// Price per usage unit, in nano-dollars
    pub unit_price_nanos: f64,
}

impl PriceTier {
    pub fn new(start_usage_amount: f64, unit_price_nanos: f64) -> Self {
        Self {
            start_usage_amount,
            unit_price_nanos,
        }
    }
}

/// A billing catalog entry reduced to what pricing needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuEntry {
    pub sku_id: String,
    pub description: String,
    pub tiers: Vec<PriceTier>,
    /// Usage units per base unit, e.g. 3600 for hour -> second
    pub base_unit_conversion_factor: f64,
    pub usage_unit: Option<String>,
}

impl SkuEntry {
    /// Single-tier entry, mostly for tests and hand-written catalogs.
    pub fn flat(description: impl Into<String>, unit_price_nanos: f64, conversion_factor: f64) -> Self {
        Self::tiered(description, vec![PriceTier::new(0.0, unit_price_nanos)], conversion_factor)
    }

    pub fn tiered(description: impl Into<String>, tiers: Vec<PriceTier>, conversion_factor: f64) -> Self {
        Self {
            sku_id: String::new(),
            description: description.into(),
            tiers,
            base_unit_conversion_factor: conversion_factor,
            usage_unit: None,
        }
    }

    /// The only tier of a flat-priced SKU.
    ///
    /// Fails when the SKU has no tiers or more than one.
    pub fn single_tier(&self) -> Result<PriceTier> {
        match self.tiers.as_slice() {
            [] => Err(CostError::EmptyPricing {
                sku: self.description.clone(),
            }),
            [tier] => Ok(*tier),
            tiers => Err(CostError::UnsupportedTieredPricing {
                sku: self.description.clone(),
                tiers: tiers.len(),
            }),
        }
    }
}

/// Billing catalog keyed by SKU description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkuCatalog {
    entries: HashMap<String, SkuEntry>,
}

impl SkuCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: SkuEntry) {
        self.entries.insert(entry.description.clone(), entry);
    }

    pub fn with_entry(mut self, entry: SkuEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn get(&self, description: &str) -> Option<&SkuEntry> {
        self.entries.get(description)
    }

    /// Lookup that fails with the exact key on a miss.
    pub fn require(&self, description: &str) -> Result<&SkuEntry> {
        self.get(description).ok_or_else(|| CostError::SkuNotFound {
            key: description.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the catalog from raw billing API SKUs.
    ///
    /// Accepts either a JSON array of SKU records (an API page's `skus`) or
    /// an object mapping description to SKU record (the `sku-list` dump).
    /// When two SKUs share a description the later one wins.
    pub fn from_billing_skus(value: Value) -> Result<Self> {
        let records: Vec<Value> = match value {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            other => {
                return Err(CostError::CatalogFetch(format!(
                    "expected an array or object of SKUs, got {}",
                    json_type(&other)
                )));
            }
        };

        let mut catalog = Self::new();
        for record in records {
            let raw: RawSku = serde_json::from_value(record)?;
            if let Some(entry) = raw.into_entry() {
                if catalog.entries.contains_key(&entry.description) {
                    debug!(description = %entry.description, "duplicate SKU description, keeping the later one");
                }
                catalog.insert(entry);
            }
        }
        debug!(skus = catalog.len(), "built billing catalog");
        Ok(catalog)
    }

    /// Read a dumped SKU list from disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_billing_skus(serde_json::from_str(&content)?)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSku {
    #[serde(default)]
    sku_id: String,
    description: String,
    #[serde(default)]
    pricing_info: Vec<RawPricingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPricingInfo {
    pricing_expression: RawPricingExpression,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPricingExpression {
    #[serde(default)]
    usage_unit: Option<String>,
    #[serde(default = "one")]
    base_unit_conversion_factor: f64,
    #[serde(default)]
    tiered_rates: Vec<RawTieredRate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTieredRate {
    #[serde(default)]
    start_usage_amount: f64,
    unit_price: RawMoney,
}

/// Google `Money`: whole units (an int64, usually sent as a string) plus nanos.
#[derive(Debug, Deserialize)]
struct RawMoney {
    #[serde(default, deserialize_with = "int64_from_string_or_number")]
    units: i64,
    #[serde(default)]
    nanos: i64,
}

impl RawMoney {
    fn nanos(&self) -> f64 {
        self.units as f64 * 1e9 + self.nanos as f64
    }
}

fn one() -> f64 {
    1.0
}

fn int64_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().ok_or_else(|| D::Error::custom(format!("{} is not an int64", n))),
        Value::String(s) => s.parse().map_err(|_| D::Error::custom(format!("'{}' is not an int64", s))),
        Value::Null => Ok(0),
        other => Err(D::Error::custom(format!("expected int64, got {}", json_type(&other)))),
    }
}

impl RawSku {
    /// SKUs without a pricing expression cannot be priced and are dropped.
    fn into_entry(self) -> Option<SkuEntry> {
        let expression = self.pricing_info.into_iter().next()?.pricing_expression;
        let mut tiers: Vec<PriceTier> = expression
            .tiered_rates
            .iter()
            .map(|rate| PriceTier::new(rate.start_usage_amount, rate.unit_price.nanos()))
            .collect();
        tiers.sort_by(|a, b| a.start_usage_amount.total_cmp(&b.start_usage_amount));

        Some(SkuEntry {
            sku_id: self.sku_id,
            description: self.description,
            tiers,
            base_unit_conversion_factor: expression.base_unit_conversion_factor,
            usage_unit: expression.usage_unit,
        })
    }
}

/// A predefined machine shape from the Compute `machineTypes.list` API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineType {
    pub name: String,
    pub guest_cpus: u32,
    pub memory_mb: u64,
}

impl MachineType {
    pub fn new(name: impl Into<String>, guest_cpus: u32, memory_mb: u64) -> Self {
        Self {
            name: name.into(),
            guest_cpus,
            memory_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn core_sku() -> Value {
        json!({
            "name": "services/6F81-5844-456A/skus/0009-6F35-3126",
            "skuId": "0009-6F35-3126",
            "description": "Custom Instance Core running in Americas",
            "pricingInfo": [{
                "pricingExpression": {
                    "usageUnit": "h",
                    "baseUnit": "s",
                    "baseUnitConversionFactor": 3600,
                    "tieredRates": [{
                        "startUsageAmount": 0,
                        "unitPrice": {"currencyCode": "USD", "units": "0", "nanos": 33174300}
                    }]
                }
            }]
        })
    }

    fn disk_sku() -> Value {
        json!({
            "skuId": "D973-5D65-BAB2",
            "description": "Storage PD Capacity",
            "pricingInfo": [{
                "pricingExpression": {
                    "usageUnit": "GiBy.mo",
                    "baseUnitConversionFactor": 2.8759101014016e15,
                    "tieredRates": [
                        {"startUsageAmount": 1024, "unitPrice": {"units": "0", "nanos": 40000000}},
                        {"startUsageAmount": 0, "unitPrice": {"units": "0", "nanos": 0}}
                    ]
                }
            }]
        })
    }

    #[test]
    fn test_parse_array_of_skus() {
        let catalog = SkuCatalog::from_billing_skus(json!([core_sku(), disk_sku()])).unwrap();
        assert_eq!(catalog.len(), 2);

        let core = catalog.require("Custom Instance Core running in Americas").unwrap();
        assert_eq!(core.sku_id, "0009-6F35-3126");
        assert_eq!(core.base_unit_conversion_factor, 3600.0);
        assert_eq!(core.tiers, vec![PriceTier::new(0.0, 33174300.0)]);
        assert_eq!(core.usage_unit.as_deref(), Some("h"));
    }

    #[test]
    fn test_parse_keyed_dump_and_sort_tiers() {
        let dump = json!({
            "Storage PD Capacity": disk_sku(),
        });
        let catalog = SkuCatalog::from_billing_skus(dump).unwrap();
        let disk = catalog.require("Storage PD Capacity").unwrap();
        assert_eq!(disk.tiers[0].start_usage_amount, 0.0);
        assert_eq!(disk.tiers[1].start_usage_amount, 1024.0);
    }

    #[test]
    fn test_money_units_added_to_nanos() {
        let sku = json!({
            "description": "Expensive",
            "pricingInfo": [{"pricingExpression": {
                "tieredRates": [{"startUsageAmount": 0, "unitPrice": {"units": 2, "nanos": 500000000}}]
            }}]
        });
        let catalog = SkuCatalog::from_billing_skus(json!([sku])).unwrap();
        let entry = catalog.require("Expensive").unwrap();
        assert_eq!(entry.tiers[0].unit_price_nanos, 2.5e9);
        assert_eq!(entry.base_unit_conversion_factor, 1.0);
    }

    #[test]
    fn test_sku_without_pricing_is_dropped() {
        let sku = json!({"description": "No price", "pricingInfo": []});
        let catalog = SkuCatalog::from_billing_skus(json!([sku])).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_require_reports_key() {
        let catalog = SkuCatalog::new();
        match catalog.require("N1 Predefined Instance Ram running in Sydney") {
            Err(CostError::SkuNotFound { key }) => {
                assert_eq!(key, "N1 Predefined Instance Ram running in Sydney")
            }
            other => panic!("expected SkuNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_single_tier() {
        assert!(SkuEntry::flat("a", 1.0, 1.0).single_tier().is_ok());
        assert!(matches!(
            SkuEntry::tiered("b", vec![], 1.0).single_tier(),
            Err(CostError::EmptyPricing { .. })
        ));
        let two = SkuEntry::tiered("c", vec![PriceTier::new(0.0, 0.0), PriceTier::new(5.0, 1.0)], 1.0);
        assert!(matches!(
            two.single_tier(),
            Err(CostError::UnsupportedTieredPricing { tiers: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_scalar() {
        assert!(matches!(
            SkuCatalog::from_billing_skus(json!("nope")),
            Err(CostError::CatalogFetch(_))
        ));
    }

    #[test]
    fn test_machine_type_deserialize() {
        let m: MachineType = serde_json::from_value(json!({
            "kind": "compute#machineType",
            "name": "n1-standard-4",
            "guestCpus": 4,
            "memoryMb": 15360,
            "zone": "us-central1-a"
        }))
        .unwrap();
        assert_eq!(m, MachineType::new("n1-standard-4", 4, 15360));
    }
}
