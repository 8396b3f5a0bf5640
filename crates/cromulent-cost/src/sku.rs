//! SKU resolution.
//!
//! Maps a job's machine shape, placement and disks to billing catalog
//! descriptions such as `Preemptible N1 Predefined Instance Core running in
//! Virginia`, then prices the job against those entries.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::catalog::{MachineType, SkuCatalog};
use crate::error::{CostError, Result};
use crate::models::ResourceCost;
use crate::operation::{region_of, OperationRecord};
use crate::tiering::TierScheme;

/// Compute class of any shape the zone does not predefine.
pub const CUSTOM_INSTANCE: &str = "Custom Instance";

/// Lookup tables behind SKU names.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTables {
    /// Region or super-region -> billing region name
    pub regions: HashMap<String, String>,
    /// Machine family -> compute class
    pub compute_classes: HashMap<String, String>,
    /// Disk type -> disk SKU description
    pub disk_classes: HashMap<String, String>,
    /// Families billed through one instance SKU instead of core + ram
    pub shared_core: HashSet<String>,
}

impl Default for PricingTables {
    fn default() -> Self {
        let regions = [
            ("us-east4", "Virginia"),
            ("us-west2", "Los Angeles"),
            ("northamerica-northeast1", "Montreal"),
            ("southamerica-east1", "Sao Paulo"),
            ("europe-west2", "London"),
            ("europe-west3", "Frankfurt"),
            ("europe-west4", "Netherlands"),
            ("europe-north1", "Finland"),
            ("asia-east2", "Hong Kong"),
            ("asia-northeast1", "Tokyo"),
            ("asia-south1", "Mumbai"),
            ("asia-southeast1", "Singapore"),
            ("australia-southeast1", "Sydney"),
            ("us", "Americas"),
            ("northamerica", "Americas"),
            ("southamerica", "Americas"),
            ("europe", "EMEA"),
            ("asia", "APAC"),
        ];
        let compute_classes = [
            ("n1-standard", "N1 Predefined Instance"),
            ("n1-highmem", "N1 Predefined Instance"),
            ("n1-highcpu", "N1 Predefined Instance"),
            ("n1-megamem", "Memory-optimized Instance"),
            ("n1-ultramem", "Memory-optimized Instance"),
            ("f1-micro", "Micro Instance with burstable CPU"),
            ("g1-small", "Small Instance with 1 VCPU"),
            ("custom", CUSTOM_INSTANCE),
        ];
        let disk_classes = [
            ("pd-standard", "Storage PD Capacity"),
            ("pd-ssd", "SSD backed PD Capacity"),
        ];

        Self {
            regions: to_map(&regions),
            compute_classes: to_map(&compute_classes),
            disk_classes: to_map(&disk_classes),
            shared_core: ["f1-micro", "g1-small"].into_iter().map(String::from).collect(),
        }
    }
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

impl PricingTables {
    /// Add or override region names.
    pub fn with_regions(mut self, regions: impl IntoIterator<Item = (String, String)>) -> Self {
        self.regions.extend(regions);
        self
    }

    /// Add or override machine family classes.
    pub fn with_compute_classes(mut self, classes: impl IntoIterator<Item = (String, String)>) -> Self {
        self.compute_classes.extend(classes);
        self
    }
}

/// Catalog descriptions for the compute side of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeSkus {
    /// Separate per-core and per-GiB SKUs
    Split { core: String, ram: String },
    /// One SKU for the whole shared-core instance
    SharedCore { instance: String },
}

/// Resolves jobs to catalog entries.
#[derive(Debug, Clone, Default)]
pub struct SkuResolver {
    tables: PricingTables,
}

impl SkuResolver {
    pub fn new(tables: PricingTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PricingTables {
        &self.tables
    }

    /// Family of the predefined type matching the job's shape in its zone.
    ///
    /// Only families with a compute class are considered, so a newer series
    /// sharing the shape (`e2-standard-2` next to `custom-2-8192`) does not
    /// capture the job. A match from the job's own series wins over others.
    /// `None` means the job runs on a custom shape.
    pub fn machine_family<'m>(&self, record: &OperationRecord, machine_types: &'m [MachineType]) -> Option<&'m str> {
        let candidates: Vec<&str> = machine_types
            .iter()
            .filter(|m| m.guest_cpus == record.cores && m.memory_mb == record.memory_mib)
            .map(|m| family_of(&m.name))
            .filter(|family| {
                let priced = *family != "custom" && self.tables.compute_classes.contains_key(*family);
                if !priced {
                    debug!(family, job_id = %record.job_id, "ignoring same-shape machine type without a compute class");
                }
                priced
            })
            .collect();

        let job_series = series_of(shape_family(&record.machine_type));
        candidates
            .iter()
            .find(|family| series_of(family) == job_series)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Formal compute class of a job.
    pub fn compute_class(&self, record: &OperationRecord, machine_types: &[MachineType]) -> Result<&str> {
        let family = self.machine_family(record, machine_types).unwrap_or("custom");
        self.tables
            .compute_classes
            .get(family)
            .map(String::as_str)
            .ok_or_else(|| CostError::UnknownComputeClass {
                machine: family.to_string(),
            })
    }

    /// Billing region name of a zone, falling back to the super-region.
    pub fn formal_region(&self, zone: &str) -> Result<&str> {
        let region = region_of(zone);
        let super_region = region_of(region);
        self.tables
            .regions
            .get(region)
            .or_else(|| self.tables.regions.get(super_region))
            .map(String::as_str)
            .ok_or_else(|| CostError::UnknownRegion {
                zone: zone.to_string(),
                region: region.to_string(),
                super_region: super_region.to_string(),
            })
    }

    /// Catalog descriptions for the job's cores and memory.
    pub fn compute_sku_names(&self, record: &OperationRecord, machine_types: &[MachineType]) -> Result<ComputeSkus> {
        let class = self.compute_class(record, machine_types)?;
        let region = self.formal_region(&record.zone)?;
        let prefix = if record.preemptible { "Preemptible " } else { "" };

        let shared = self
            .machine_family(record, machine_types)
            .is_some_and(|family| self.tables.shared_core.contains(family));
        if shared {
            return Ok(ComputeSkus::SharedCore {
                instance: format!("{prefix}{class} running in {region}"),
            });
        }

        Ok(ComputeSkus::Split {
            core: format!("{prefix}{class} Core running in {region}"),
            ram: format!("{prefix}{class} Ram running in {region}"),
        })
    }

    /// Catalog description for a disk type.
    pub fn disk_sku_name(&self, disk_class: &str) -> Result<&str> {
        self.tables
            .disk_classes
            .get(disk_class)
            .map(String::as_str)
            .ok_or_else(|| CostError::UnknownDiskClass {
                disk_class: disk_class.to_string(),
            })
    }

    /// Price one job. `None` when the job has no end time.
    pub fn price_operation(
        &self,
        catalog: &SkuCatalog,
        record: &OperationRecord,
        machine_types: &[MachineType],
        scheme: TierScheme,
    ) -> Result<Option<ResourceCost>> {
        let Some(usage) = record.usage() else {
            return Ok(None);
        };

        let (cpu, mem) = match self.compute_sku_names(record, machine_types)? {
            ComputeSkus::Split { core, ram } => (
                usage.cpu.nano_dollars(catalog.require(&core)?)?,
                usage.ram.nano_dollars(catalog.require(&ram)?)?,
            ),
            // priced per instance, so one "core"
            ComputeSkus::SharedCore { instance } => {
                let mut cpu = usage.cpu;
                cpu.cores = 1;
                (cpu.nano_dollars(catalog.require(&instance)?)?, 0.0)
            }
        };

        let mut disk = 0.0;
        for d in &usage.disks {
            let sku = catalog.require(self.disk_sku_name(&d.disk_class)?)?;
            disk += d.nano_dollars(sku, scheme)?;
        }

        let cost = ResourceCost::new(cpu, mem, disk);
        debug!(job_id = %record.job_id, cpu, mem, disk, "priced operation");
        Ok(Some(cost))
    }
}

/// `n1-standard-8` -> `n1-standard`; names without a numeric suffix
/// (`f1-micro`) are their own family.
/// `n2-custom` from `zones/us-east4-b/machineTypes/n2-custom-2-8192`.
fn shape_family(machine_type: &str) -> &str {
    let name = machine_type.rsplit('/').next().unwrap_or(machine_type);
    name.rsplitn(3, '-').nth(2).unwrap_or(name)
}

/// Machine series of a family. Plain `custom` shapes are N1.
fn series_of(family: &str) -> &str {
    match family.split_once('-') {
        Some((series, _)) => series,
        None => "n1",
    }
}

fn family_of(machine_name: &str) -> &str {
    match machine_name.rsplit_once('-') {
        Some((family, size)) if !size.is_empty() && size.bytes().all(|b| b.is_ascii_digit()) => family,
        _ => machine_name,
    }
}
