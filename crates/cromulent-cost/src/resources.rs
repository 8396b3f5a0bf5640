//! Resource usage models.
//!
//! Cpu and memory are billed per second with a one minute minimum, through
//! the SKU's conversion factor from its billed unit (hour, GiB-hour) to
//! the base unit (second, byte-second). Disk is billed per GiB-month
//! through the tier scheme of the run.
//!
//! All amounts are nano-dollars.

use crate::catalog::SkuEntry;
use crate::error::{CostError, Result};
use crate::tiering::TierScheme;

/// Minimum billed duration for cpu and memory, in seconds.
pub const MIN_BILLABLE_SECS: f64 = 60.0;

/// Disk billing month: 30 days.
pub const SECONDS_PER_MONTH: f64 = 86_400.0 * 30.0;

pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Seconds billed for a cpu/memory duration.
pub fn billable_seconds(duration_secs: f64) -> f64 {
    duration_secs.max(MIN_BILLABLE_SECS)
}

/// vCPU usage of one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cpu {
    pub cores: u32,
    pub duration_secs: f64,
}

impl Cpu {
    pub fn new(cores: u32, duration_secs: f64) -> Self {
        Self { cores, duration_secs }
    }

    pub fn nano_dollars(&self, sku: &SkuEntry) -> Result<f64> {
        let base_price = base_price(sku)?; // nano-dollars / second
        Ok(billable_seconds(self.duration_secs) * self.cores as f64 * base_price)
    }
}

/// Memory usage of one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ram {
    pub size_gib: f64,
    pub duration_secs: f64,
}

impl Ram {
    pub fn new(size_gib: f64, duration_secs: f64) -> Self {
        Self { size_gib, duration_secs }
    }

    pub fn nano_dollars(&self, sku: &SkuEntry) -> Result<f64> {
        let base_price = base_price(sku)?; // nano-dollars / (byte * second)
        let bytes = self.size_gib * BYTES_PER_GIB;
        Ok(billable_seconds(self.duration_secs) * bytes * base_price)
    }
}

/// One attached disk of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct Disk {
    pub size_gib: f64,
    pub duration_secs: f64,
    pub disk_class: String,
}

impl Disk {
    pub fn new(size_gib: f64, duration_secs: f64, disk_class: impl Into<String>) -> Self {
        Self {
            size_gib,
            duration_secs,
            disk_class: disk_class.into(),
        }
    }

    /// Usage in the catalog's unit, GiB-months.
    pub fn gib_months(&self) -> f64 {
        self.size_gib * self.duration_secs / SECONDS_PER_MONTH
    }

    pub fn nano_dollars(&self, sku: &SkuEntry, scheme: TierScheme) -> Result<f64> {
        if sku.tiers.is_empty() {
            return Err(CostError::EmptyPricing {
                sku: sku.description.clone(),
            });
        }
        Ok(scheme.price(self.gib_months(), &sku.tiers))
    }
}

/// Unit price converted to the SKU's base unit. Flat-priced SKUs only.
fn base_price(sku: &SkuEntry) -> Result<f64> {
    let tier = sku.single_tier()?;
    Ok(tier.unit_price_nanos / sku.base_unit_conversion_factor)
}
