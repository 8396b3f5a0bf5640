//! Workflow cost estimation.
//!
//! Walks a workflow's call graph depth-first. Sub-workflows are estimated
//! recursively and merged into the parent summary; leaf jobs are priced
//! from their operation record; call-cached jobs are priced as the job
//! they reused, found by following the cache reference into the origin
//! workflow.
//!
//! ## Usage
//!
//! ```no_run
//! use cromulent_cost::{
//!     CostEstimator, SkuCatalog, StaticMachineTypes, StaticOperations, StaticWorkflows, TierScheme,
//!     WorkflowMetadata,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> cromulent_cost::Result<()> {
//! let metadata = WorkflowMetadata::from_json(&std::fs::read_to_string("metadata.json")?)?;
//! let mut estimator = CostEstimator::new(
//!     Arc::new(StaticWorkflows::new()),
//!     Arc::new(StaticOperations::new()),
//!     Arc::new(StaticMachineTypes::new()),
//!     Arc::new(SkuCatalog::from_file("skus.json")?),
//! );
//! let summary = estimator.calculate_cost(&metadata, TierScheme::All).await?;
//! println!("total: {} nano-dollars", summary.total_cost());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::catalog::{MachineType, SkuCatalog};
use crate::error::{CostError, Result};
use crate::models::{CacheReference, CostBreakdown, CostSummary, Execution, ExecutionKind, WorkflowMetadata};
use crate::operation::OperationRecord;
use crate::sku::SkuResolver;
use crate::source::{BillingCatalogSource, MachineTypeSource, OperationSource, WorkflowMetadataSource};
use crate::tiering::TierScheme;

/// Fetches memoised for the duration of one estimate.
#[derive(Debug, Default)]
pub struct RunCache {
    workflows: HashMap<String, Arc<WorkflowMetadata>>,
    operations: HashMap<String, Arc<OperationRecord>>,
    machine_types: HashMap<(String, String), Arc<Vec<MachineType>>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn zone_count(&self) -> usize {
        self.machine_types.len()
    }

    pub fn clear(&mut self) {
        self.workflows.clear();
        self.operations.clear();
        self.machine_types.clear();
    }
}

/// Estimates workflow costs against one billing catalog.
pub struct CostEstimator {
    workflows: Arc<dyn WorkflowMetadataSource>,
    operations: Arc<dyn OperationSource>,
    machine_types: Arc<dyn MachineTypeSource>,
    catalog: Arc<SkuCatalog>,
    resolver: SkuResolver,
    cache: RunCache,
}

impl CostEstimator {
    pub fn new(
        workflows: Arc<dyn WorkflowMetadataSource>,
        operations: Arc<dyn OperationSource>,
        machine_types: Arc<dyn MachineTypeSource>,
        catalog: Arc<SkuCatalog>,
    ) -> Self {
        Self {
            workflows,
            operations,
            machine_types,
            catalog,
            resolver: SkuResolver::default(),
            cache: RunCache::new(),
        }
    }

    /// Build an estimator, fetching the catalog once from `billing`.
    pub async fn load(
        workflows: Arc<dyn WorkflowMetadataSource>,
        operations: Arc<dyn OperationSource>,
        machine_types: Arc<dyn MachineTypeSource>,
        billing: &dyn BillingCatalogSource,
    ) -> Result<Self> {
        let catalog = billing.sku_catalog().await?;
        info!(skus = catalog.len(), "loaded billing catalog");
        Ok(Self::new(workflows, operations, machine_types, Arc::new(catalog)))
    }

    /// Use custom region and class tables.
    pub fn with_resolver(mut self, resolver: SkuResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn catalog(&self) -> &SkuCatalog {
        &self.catalog
    }

    /// Memoised fetches of the last run.
    pub fn cache(&self) -> &RunCache {
        &self.cache
    }

    /// Estimate the cost of a workflow, per task.
    ///
    /// Each call is one run: the fetch cache starts empty. Any failed
    /// fetch or lookup aborts the estimate. Jobs without an end time are
    /// skipped.
    pub async fn calculate_cost(&mut self, metadata: &WorkflowMetadata, scheme: TierScheme) -> Result<CostSummary> {
        self.cache.clear();
        info!(
            workflow = metadata.id.as_deref().unwrap_or("<inline>"),
            tasks = metadata.calls.len(),
            scheme = %scheme,
            "estimating workflow cost"
        );

        let summary = self.walk(metadata, scheme).await?;

        info!(
            tasks = summary.len(),
            total_nanos = summary.total_cost(),
            workflows_fetched = self.cache.workflow_count(),
            operations_fetched = self.cache.operation_count(),
            "estimate complete"
        );
        Ok(summary)
    }

    fn walk<'a>(&'a mut self, metadata: &'a WorkflowMetadata, scheme: TierScheme) -> BoxFuture<'a, Result<CostSummary>> {
        Box::pin(async move {
            let mut summary = CostSummary::new();

            for (task, executions) in metadata.calls.iter() {
                debug!(task, executions = executions.len(), "processing task");
                let mut breakdown = CostBreakdown::new();

                for execution in executions {
                    match execution.kind() {
                        ExecutionKind::SubWorkflowInline(sub) => {
                            debug!(task, shard = execution.shard_index, "entering inlined sub-workflow");
                            let nested = self.walk(sub, scheme).await?;
                            summary.merge(nested);
                        }
                        ExecutionKind::SubWorkflowById(id) => {
                            debug!(task, shard = execution.shard_index, sub_workflow = id, "entering sub-workflow");
                            let sub = self.workflow(id).await?;
                            let nested = self.walk(&sub, scheme).await?;
                            summary.merge(nested);
                        }
                        ExecutionKind::Job(job_id) => {
                            self.price_job(task, execution, job_id, scheme, &mut breakdown).await?;
                        }
                        ExecutionKind::CallCached(result) => {
                            let job_id = self.resolve_cache_hit(result).await?;
                            debug!(task, shard = execution.shard_index, origin = %job_id, "call cached");
                            self.price_job(task, execution, &job_id, scheme, &mut breakdown).await?;
                        }
                        ExecutionKind::Unattributable => {
                            warn!(task, shard = execution.shard_index, "execution has no job, cache hit or sub-workflow; skipping");
                        }
                    }
                }

                summary.add_breakdown(task, breakdown);
            }

            Ok(summary)
        })
    }

    async fn price_job(
        &mut self,
        task: &str,
        execution: &Execution,
        job_id: &str,
        scheme: TierScheme,
        breakdown: &mut CostBreakdown,
    ) -> Result<()> {
        let shard = execution.shard_index;
        let record = self.operation(job_id).await?;
        if record.end_time.is_none() {
            warn!(task, shard, job_id, "operation has no end time; not billed");
            return Ok(());
        }

        let machine_types = self.zone_machine_types(&record.project, &record.zone).await?;
        if let Some(cost) = self
            .resolver
            .price_operation(&self.catalog, &record, &machine_types, scheme)?
        {
            debug!(task, shard, job_id, nanos = cost.total(), "billed shard");
            breakdown.add(shard, cost);
        }
        Ok(())
    }

    /// Job id behind a call-cache result string. Chains of cache hits are
    /// followed until a call with its own job id.
    async fn resolve_cache_hit(&mut self, result: &str) -> Result<String> {
        let mut reference = CacheReference::parse(result)?;
        loop {
            let origin = self.workflow(&reference.workflow_id).await?;
            let execution = origin
                .executions(&reference.task_name)
                .and_then(|executions| select_shard(executions, reference.shard_index));

            match execution.map(Execution::kind) {
                Some(ExecutionKind::Job(job_id)) => return Ok(job_id.to_string()),
                Some(ExecutionKind::CallCached(next)) => {
                    debug!(from = %reference, to = next, "following cache chain");
                    reference = CacheReference::parse(next)?;
                }
                _ => {
                    return Err(CostError::CacheTargetMissing {
                        workflow_id: reference.workflow_id,
                        task_name: reference.task_name,
                        shard_index: reference.shard_index,
                    });
                }
            }
        }
    }

    async fn workflow(&mut self, id: &str) -> Result<Arc<WorkflowMetadata>> {
        if let Some(metadata) = self.cache.workflows.get(id) {
            return Ok(Arc::clone(metadata));
        }
        debug!(workflow = id, "fetching workflow metadata");
        let metadata = Arc::new(self.workflows.workflow_metadata(id).await?);
        self.cache.workflows.insert(id.to_string(), Arc::clone(&metadata));
        Ok(metadata)
    }

    async fn operation(&mut self, job_id: &str) -> Result<Arc<OperationRecord>> {
        if let Some(record) = self.cache.operations.get(job_id) {
            return Ok(Arc::clone(record));
        }
        debug!(job_id, "fetching operation");
        let raw = self.operations.operation_metadata(job_id).await?;
        let record = Arc::new(OperationRecord::from_json(job_id, &raw)?);
        self.cache.operations.insert(job_id.to_string(), Arc::clone(&record));
        Ok(record)
    }

    async fn zone_machine_types(&mut self, project: &str, zone: &str) -> Result<Arc<Vec<MachineType>>> {
        let key = (project.to_string(), zone.to_string());
        if let Some(types) = self.cache.machine_types.get(&key) {
            return Ok(Arc::clone(types));
        }
        debug!(project, zone, "fetching machine types");
        let types = Arc::new(self.machine_types.machine_types(project, zone).await?);
        self.cache.machine_types.insert(key, Arc::clone(&types));
        Ok(types)
    }
}

/// The execution a cache reference points at.
///
/// Matches on `shardIndex`, preferring the last attempt with a job id.
/// When no execution carries the index, falls back to its position in the
/// list, counting from the end for negative indexes.
fn select_shard(executions: &[Execution], shard_index: i64) -> Option<&Execution> {
    let mut matching = executions.iter().filter(|e| e.shard_index == shard_index);
    let last_job = matching.clone().rev().find(|e| e.job_id.is_some());
    if let Some(execution) = last_job.or_else(|| matching.next_back()) {
        return Some(execution);
    }

    let position = if shard_index < 0 {
        executions.len().checked_sub(shard_index.unsigned_abs() as usize)?
    } else {
        shard_index as usize
    };
    executions.get(position)
}
