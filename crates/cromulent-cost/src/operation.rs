//! Genomics operation parsing.
//!
//! Normalizes a Pipelines API (v2alpha1) operation document into the shape
//! pricing needs: machine shape, placement, lifetime and disks.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;

use crate::error::{CostError, Result};
use crate::resources::{Cpu, Disk, Ram};

/// Disk class used when a disk does not name one, and for the boot disk.
pub const DEFAULT_DISK_CLASS: &str = "pd-standard";

/// `<family>-<cores>-<memoryMiB>`, e.g. `custom-8-7424`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineShape {
    pub family: String,
    pub cores: u32,
    pub memory_mib: u64,
}

impl MachineShape {
    /// Parse a machine type name. A leading resource path
    /// (`zones/us-east4-b/machineTypes/...`) is ignored.
    pub fn parse(machine_type: &str) -> Result<Self> {
        let invalid = || CostError::MachineShape(machine_type.to_string());

        let name = machine_type.rsplit('/').next().unwrap_or(machine_type);
        let mut parts = name.rsplitn(3, '-');
        let (Some(memory), Some(cores), Some(family)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if family.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            family: family.to_string(),
            cores: cores.parse().map_err(|_| invalid())?,
            memory_mib: memory.parse().map_err(|_| invalid())?,
        })
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / 1024.0
    }
}

/// A disk attached to the job's VM.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedDisk {
    pub size_gib: f64,
    pub disk_class: String,
}

impl AttachedDisk {
    pub fn new(size_gib: f64, disk_class: impl Into<String>) -> Self {
        Self {
            size_gib,
            disk_class: disk_class.into(),
        }
    }
}

/// A normalized compute job.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub job_id: String,
    pub machine_type: String,
    pub cores: u32,
    pub memory_gib: f64,
    pub memory_mib: u64,
    pub zone: String,
    pub region: String,
    pub project: String,
    pub preemptible: bool,
    pub start_time: DateTime<Utc>,
    /// Absent while the job runs, or when it was aborted
    pub end_time: Option<DateTime<Utc>>,
    /// Data disks followed by the boot disk
    pub disks: Vec<AttachedDisk>,
}

/// Billable usage of one job, all over the job's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Usage {
    pub cpu: Cpu,
    pub ram: Ram,
    pub disks: Vec<Disk>,
}

impl OperationRecord {
    /// Parse an operation document.
    pub fn from_json(job_id: &str, operation: &Value) -> Result<Self> {
        let malformed = |reason: String| CostError::MalformedOperation {
            job_id: job_id.to_string(),
            reason,
        };

        let meta = operation
            .get("metadata")
            .ok_or_else(|| malformed("missing 'metadata'".into()))?;
        let resources = meta
            .pointer("/pipeline/resources")
            .ok_or_else(|| malformed("missing 'metadata.pipeline.resources'".into()))?;
        let vm = resources
            .get("virtualMachine")
            .ok_or_else(|| malformed("missing 'virtualMachine'".into()))?;

        let machine_type = vm
            .get("machineType")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing 'virtualMachine.machineType'".into()))?;
        let shape = MachineShape::parse(machine_type)?;

        let project = resources
            .get("projectId")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing 'resources.projectId'".into()))?;

        let zone = latest_zone(meta).ok_or_else(|| malformed("no event carries 'details.zone'".into()))?;

        let start_time = meta
            .get("startTime")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing 'startTime'".into()))
            .and_then(|s| parse_timestamp(s).ok_or_else(|| malformed(format!("bad startTime '{}'", s))))?;
        let end_time = match meta.get("endTime").and_then(Value::as_str) {
            Some(s) => Some(parse_timestamp(s).ok_or_else(|| malformed(format!("bad endTime '{}'", s)))?),
            None => None,
        };

        let mut disks = Vec::new();
        for disk in vm.get("disks").and_then(Value::as_array).into_iter().flatten() {
            let size = disk
                .get("sizeGb")
                .and_then(number)
                .ok_or_else(|| malformed("disk without 'sizeGb'".into()))?;
            let class = disk.get("type").and_then(Value::as_str).unwrap_or(DEFAULT_DISK_CLASS);
            disks.push(AttachedDisk::new(size, class));
        }
        let boot = vm
            .get("bootDiskSizeGb")
            .and_then(number)
            .ok_or_else(|| malformed("missing 'virtualMachine.bootDiskSizeGb'".into()))?;
        disks.push(AttachedDisk::new(boot, DEFAULT_DISK_CLASS));

        let record = Self {
            job_id: job_id.to_string(),
            machine_type: machine_type.to_string(),
            cores: shape.cores,
            memory_gib: shape.memory_gib(),
            memory_mib: shape.memory_mib,
            region: region_of(&zone).to_string(),
            zone,
            project: project.to_string(),
            preemptible: vm.get("preemptible").and_then(Value::as_bool).unwrap_or(false),
            start_time,
            end_time,
            disks,
        };
        trace!(job_id, machine = %record.machine_type, zone = %record.zone, "parsed operation");
        Ok(record)
    }

    /// Wall-clock seconds between start and end; `None` without an end time.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }

    /// Resource usage over the job's lifetime; `None` when the duration is
    /// unknown.
    pub fn usage(&self) -> Option<Usage> {
        let duration = self.duration_secs()?;
        Some(Usage {
            cpu: Cpu::new(self.cores, duration),
            ram: Ram::new(self.memory_gib, duration),
            disks: self
                .disks
                .iter()
                .map(|d| Disk::new(d.size_gib, duration, d.disk_class.clone()))
                .collect(),
        })
    }
}

/// Zone minus its trailing `-<suffix>`: `us-east4-b` -> `us-east4`.
pub fn region_of(zone: &str) -> &str {
    zone.rsplit_once('-').map_or(zone, |(region, _)| region)
}

/// Zone of the most recent event that names one. Later list entries win
/// ties and events without a timestamp.
fn latest_zone(meta: &Value) -> Option<String> {
    meta.get("events")?
        .as_array()?
        .iter()
        .filter_map(|event| {
            let zone = event.pointer("/details/zone")?.as_str()?;
            let at = event.get("timestamp").and_then(Value::as_str).and_then(parse_timestamp);
            Some((at, zone))
        })
        .max_by_key(|(at, _)| *at)
        .map(|(_, zone)| zone.to_string())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

/// Sizes come as numbers or, for int64 fields, as strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
