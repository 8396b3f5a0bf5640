//! Data sources the estimator pulls from.
//!
//! The HTTP implementations live in `cromulent-client`. The in-memory ones
//! here serve offline runs and tests, and count their fetches so callers
//! can check memoisation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use ::async_trait::async_trait;
use serde_json::Value;

use crate::catalog::{MachineType, SkuCatalog};
use crate::error::{CostError, Result};
use crate::models::WorkflowMetadata;

/// Workflow metadata by workflow id.
#[async_trait]
pub trait WorkflowMetadataSource: Send + Sync {
    async fn workflow_metadata(&self, id: &str) -> Result<WorkflowMetadata>;
}

/// Raw compute job (Genomics operation) metadata by job id.
#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn operation_metadata(&self, job_id: &str) -> Result<Value>;
}

/// Predefined machine types of a zone.
#[async_trait]
pub trait MachineTypeSource: Send + Sync {
    async fn machine_types(&self, project: &str, zone: &str) -> Result<Vec<MachineType>>;
}

/// The Compute Engine billing catalog.
#[async_trait]
pub trait BillingCatalogSource: Send + Sync {
    async fn sku_catalog(&self) -> Result<SkuCatalog>;
}

#[async_trait]
impl BillingCatalogSource for SkuCatalog {
    async fn sku_catalog(&self) -> Result<SkuCatalog> {
        Ok(self.clone())
    }
}

/// Workflow metadata held in memory.
#[derive(Debug, Default)]
pub struct StaticWorkflows {
    workflows: HashMap<String, WorkflowMetadata>,
    fetches: AtomicUsize,
}

impl StaticWorkflows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(mut self, id: impl Into<String>, metadata: WorkflowMetadata) -> Self {
        self.workflows.insert(id.into(), metadata);
        self
    }

    /// Number of lookups served so far, hits and misses.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowMetadataSource for StaticWorkflows {
    async fn workflow_metadata(&self, id: &str) -> Result<WorkflowMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| CostError::WorkflowFetch {
                id: id.to_string(),
                message: "unknown workflow".to_string(),
            })
    }
}

/// Operation documents held in memory.
#[derive(Debug, Default)]
pub struct StaticOperations {
    operations: HashMap<String, Value>,
    fetches: AtomicUsize,
}

impl StaticOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, job_id: impl Into<String>, operation: Value) -> Self {
        self.operations.insert(job_id.into(), operation);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationSource for StaticOperations {
    async fn operation_metadata(&self, job_id: &str) -> Result<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.operations
            .get(job_id)
            .cloned()
            .ok_or_else(|| CostError::OperationFetch {
                job_id: job_id.to_string(),
                message: "unknown operation".to_string(),
            })
    }
}

/// Machine types held in memory. Zones without an entry predefine
/// nothing, so every shape there prices as a custom instance.
#[derive(Debug, Default)]
pub struct StaticMachineTypes {
    zones: HashMap<(String, String), Vec<MachineType>>,
    fetches: AtomicUsize,
}

impl StaticMachineTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, project: impl Into<String>, zone: impl Into<String>, types: Vec<MachineType>) -> Self {
        self.zones.insert((project.into(), zone.into()), types);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MachineTypeSource for StaticMachineTypes {
    async fn machine_types(&self, project: &str, zone: &str) -> Result<Vec<MachineType>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .zones
            .get(&(project.to_string(), zone.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SkuEntry;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_workflows() {
        let source = StaticWorkflows::new().with_workflow("wf-1", WorkflowMetadata::default());
        assert!(source.workflow_metadata("wf-1").await.is_ok());
        assert!(matches!(
            source.workflow_metadata("wf-2").await,
            Err(CostError::WorkflowFetch { id, .. }) if id == "wf-2"
        ));
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_static_operations() {
        let source = StaticOperations::new().with_operation("op-1", json!({"done": true}));
        assert_eq!(source.operation_metadata("op-1").await.unwrap()["done"], true);
        assert!(source.operation_metadata("op-2").await.unwrap_err().is_fetch_error());
    }

    #[tokio::test]
    async fn test_static_machine_types_default_empty() {
        let source = StaticMachineTypes::new().with_zone("p", "us-east4-b", vec![MachineType::new("n1-standard-1", 1, 3840)]);
        assert_eq!(source.machine_types("p", "us-east4-b").await.unwrap().len(), 1);
        assert!(source.machine_types("p", "us-east4-c").await.unwrap().is_empty());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_catalog_is_its_own_source() {
        let catalog = SkuCatalog::new().with_entry(SkuEntry::flat("Storage PD Capacity", 1.0, 1.0));
        assert_eq!(catalog.sku_catalog().await.unwrap(), catalog);
    }
}
