//! # cromulent-cost
//!
//! Cost estimation for Cromwell workflows run on Google Cloud.
//!
//! This crate provides:
//! - [`CostEstimator`] - Walk a workflow call graph into a per-task [`CostSummary`]
//! - [`SkuResolver`] - Map jobs to billing catalog entries
//! - [`OperationRecord`] - Normalized Genomics operation metadata
//! - [`TierScheme`] - The four ways of applying tiered rates
//!
//! Data comes in through the [`source`] traits; `cromulent-client` provides
//! HTTP implementations, and [`StaticWorkflows`], [`StaticOperations`] and
//! [`StaticMachineTypes`] serve offline runs.
//!
//! All costs are in nano-dollars.

pub mod catalog;
pub mod error;
pub mod estimator;
pub mod models;
pub mod operation;
pub mod resources;
pub mod sku;
pub mod source;
pub mod tiering;

// Re-export main types
pub use catalog::{MachineType, PriceTier, SkuCatalog, SkuEntry};
pub use error::{CostError, Result};
pub use estimator::{CostEstimator, RunCache};
pub use models::{
    CacheReference, CallCaching, CostBreakdown, CostSummary, Execution, ExecutionKind, ResourceCost, ShardCost,
    TaskCalls, TaskCost, WorkflowMetadata,
};
pub use operation::{AttachedDisk, MachineShape, OperationRecord};
pub use resources::{Cpu, Disk, Ram};
pub use sku::{ComputeSkus, PricingTables, SkuResolver};
pub use source::{
    BillingCatalogSource, MachineTypeSource, OperationSource, StaticMachineTypes, StaticOperations, StaticWorkflows,
    WorkflowMetadataSource,
};
pub use tiering::TierScheme;
