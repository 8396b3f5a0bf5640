//! Data models for workflow metadata and cost summaries.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CostError, Result};

/// Cromwell workflow metadata, as returned by
/// `/api/workflows/v1/{id}/metadata`.
///
/// Only the fields the estimator needs are modelled; everything else in the
/// document is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// Workflow id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Workflow name from the WDL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,

    /// Workflow status (Running, Succeeded, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Task name -> executions, in call-graph order
    #[serde(default)]
    pub calls: TaskCalls,
}

impl WorkflowMetadata {
    /// Parse workflow metadata from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Executions recorded for `task`.
    pub fn executions(&self, task: &str) -> Option<&[Execution]> {
        self.calls.get(task)
    }
}

/// Ordered mapping of task name to its executions.
///
/// JSON object order is kept on deserialization so that reports list tasks
/// and shards in the order Cromwell recorded them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCalls(Vec<(String, Vec<Execution>)>);

impl TaskCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, or extend it if the name is already present.
    pub fn push(&mut self, task: impl Into<String>, executions: Vec<Execution>) {
        let task = task.into();
        match self.0.iter_mut().find(|(name, _)| *name == task) {
            Some((_, existing)) => existing.extend(executions),
            None => self.0.push((task, executions)),
        }
    }

    pub fn get(&self, task: &str) -> Option<&[Execution]> {
        self.0
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, executions)| executions.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Execution])> {
        self.0
            .iter()
            .map(|(name, executions)| (name.as_str(), executions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TaskCalls {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, executions) in &self.0 {
            map.serialize_entry(name, executions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaskCalls {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TaskCallsVisitor;

        impl<'de> Visitor<'de> for TaskCallsVisitor {
            type Value = TaskCalls;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task name to executions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<TaskCalls, A::Error> {
                let mut calls = TaskCalls::new();
                while let Some((name, executions)) = access.next_entry::<String, Vec<Execution>>()? {
                    calls.push(name, executions);
                }
                Ok(calls)
            }
        }

        deserializer.deserialize_map(TaskCallsVisitor)
    }
}

/// One attempt of one shard of one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Shard index; Cromwell reports -1 for non-scattered calls
    #[serde(default)]
    pub shard_index: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<String>,

    /// Backend job id (a Genomics operation name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_metadata: Option<Box<WorkflowMetadata>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_caching: Option<CallCaching>,
}

/// How the cost of an execution is attributed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionKind<'a> {
    /// Nested workflow whose metadata is inlined
    SubWorkflowInline(&'a WorkflowMetadata),
    /// Nested workflow that must be fetched by id
    SubWorkflowById(&'a str),
    /// Leaf job with its own job id
    Job(&'a str),
    /// Leaf job satisfied from the call cache; carries the raw result string
    CallCached(&'a str),
    /// Nothing to bill (e.g. a call that never started)
    Unattributable,
}

impl Execution {
    /// Leaf execution with a direct job id.
    pub fn job(shard_index: i64, job_id: impl Into<String>) -> Self {
        Self {
            shard_index,
            job_id: Some(job_id.into()),
            ..Default::default()
        }
    }

    /// Leaf execution reusing a cached result.
    pub fn cached(shard_index: i64, result: impl Into<String>) -> Self {
        Self {
            shard_index,
            call_caching: Some(CallCaching {
                hit: Some(true),
                result: Some(result.into()),
            }),
            ..Default::default()
        }
    }

    /// Sub-workflow execution referenced by id.
    pub fn sub_workflow_id(shard_index: i64, id: impl Into<String>) -> Self {
        Self {
            shard_index,
            sub_workflow_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Sub-workflow execution with inlined metadata.
    pub fn sub_workflow(shard_index: i64, metadata: WorkflowMetadata) -> Self {
        Self {
            shard_index,
            sub_workflow_metadata: Some(Box::new(metadata)),
            ..Default::default()
        }
    }

    /// Classify the execution. Sub-workflows win over job ids, job ids win
    /// over cache hits. Cache misses recorded on calls that never got a job
    /// are unattributable.
    pub fn kind(&self) -> ExecutionKind<'_> {
        if let Some(meta) = &self.sub_workflow_metadata {
            return ExecutionKind::SubWorkflowInline(meta);
        }
        if let Some(id) = &self.sub_workflow_id {
            return ExecutionKind::SubWorkflowById(id);
        }
        if let Some(job_id) = &self.job_id {
            return ExecutionKind::Job(job_id);
        }
        match self.call_caching.as_ref().and_then(CallCaching::hit_result) {
            Some(result) => ExecutionKind::CallCached(result),
            None => ExecutionKind::Unattributable,
        }
    }
}

/// The `callCaching` block of an execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallCaching {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit: Option<bool>,

    /// e.g. `Cache Hit: 1b2c...:wf.align:3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl CallCaching {
    /// Result string of a cache hit. An explicit `hit` flag decides; without
    /// one the result must read `Cache Hit`.
    pub fn hit_result(&self) -> Option<&str> {
        let result = self.result.as_deref()?;
        let hit = self.hit.unwrap_or_else(|| result.starts_with("Cache Hit"));
        hit.then_some(result)
    }
}

/// Back-pointer from a call-cached shard to the call it reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheReference {
    pub workflow_id: String,
    pub task_name: String,
    pub shard_index: i64,
}

impl CacheReference {
    /// Parse a call-caching result string. The third whitespace-separated
    /// token must be `<workflowId>:<taskName>:<shardIndex>`.
    pub fn parse(result: &str) -> Result<Self> {
        let malformed = || CostError::MalformedCacheReference(result.to_string());

        let token = result.split_whitespace().nth(2).ok_or_else(malformed)?;
        let mut parts = token.split(':');
        let (Some(workflow_id), Some(task_name), Some(shard), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if workflow_id.is_empty() || task_name.is_empty() {
            return Err(malformed());
        }
        let shard_index = shard.parse::<i64>().map_err(|_| malformed())?;

        Ok(Self {
            workflow_id: workflow_id.to_string(),
            task_name: task_name.to_string(),
            shard_index,
        })
    }
}

impl fmt::Display for CacheReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.workflow_id, self.task_name, self.shard_index)
    }
}

/// Cost of cpu, memory and disk usage, in nano-dollars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
}

impl ResourceCost {
    pub fn new(cpu: f64, mem: f64, disk: f64) -> Self {
        Self { cpu, mem, disk }
    }

    pub fn total(&self) -> f64 {
        self.cpu + self.mem + self.disk
    }
}

impl Add for ResourceCost {
    type Output = ResourceCost;

    fn add(self, rhs: ResourceCost) -> ResourceCost {
        ResourceCost {
            cpu: self.cpu + rhs.cpu,
            mem: self.mem + rhs.mem,
            disk: self.disk + rhs.disk,
        }
    }
}

impl AddAssign for ResourceCost {
    fn add_assign(&mut self, rhs: ResourceCost) {
        *self = *self + rhs;
    }
}

/// Accumulated cost of one shard. Every attempt of the shard adds here.
///
/// Serialized as the value of a shard-keyed map; the shard index is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardCost {
    #[serde(skip)]
    pub shard: i64,
    #[serde(default = "one_attempt")]
    pub attempts: u32,
    #[serde(flatten)]
    pub cost: ResourceCost,
}

fn one_attempt() -> u32 {
    1
}

/// Per-shard costs from one visit of a task in the call graph.
///
/// Serialized as `{"<shard>": {"cpu", "mem", "disk", "attempts"}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBreakdown {
    pub shards: Vec<ShardCost>,
}

impl Serialize for CostBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.shards.len()))?;
        for shard in &self.shards {
            map.serialize_entry(&shard.shard, shard)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CostBreakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = CostBreakdown;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of shard index to costs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<CostBreakdown, A::Error> {
                let mut shards = Vec::new();
                while let Some((index, mut shard)) = access.next_entry::<i64, ShardCost>()? {
                    shard.shard = index;
                    shards.push(shard);
                }
                Ok(CostBreakdown { shards })
            }
        }

        deserializer.deserialize_map(BreakdownVisitor)
    }
}

impl CostBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attempt's cost to `shard`, keeping first-seen shard order.
    pub fn add(&mut self, shard: i64, cost: ResourceCost) {
        match self.shards.iter_mut().find(|s| s.shard == shard) {
            Some(existing) => {
                existing.attempts += 1;
                existing.cost += cost;
            }
            None => self.shards.push(ShardCost {
                shard,
                attempts: 1,
                cost,
            }),
        }
    }

    /// Sum over all shards.
    pub fn cost(&self) -> ResourceCost {
        self.shards
            .iter()
            .fold(ResourceCost::default(), |acc, s| acc + s.cost)
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Number of distinct shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }
}

/// Cost of one task, summed over every place it appears in the call graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCost {
    /// Key of the entry in a serialized summary
    #[serde(skip)]
    pub name: String,
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    #[serde(rename = "total-cost")]
    pub total_cost: f64,
    pub items: Vec<CostBreakdown>,
}

impl TaskCost {
    fn from_breakdown(name: impl Into<String>, breakdown: CostBreakdown) -> Self {
        let cost = breakdown.cost();
        Self {
            name: name.into(),
            cpu: cost.cpu,
            mem: cost.mem,
            disk: cost.disk,
            total_cost: cost.total(),
            items: vec![breakdown],
        }
    }

    /// Add another entry for the same task into this one.
    fn absorb(&mut self, other: TaskCost) {
        self.cpu += other.cpu;
        self.mem += other.mem;
        self.disk += other.disk;
        self.total_cost += other.total_cost;
        self.items.extend(other.items);
    }

    /// Number of shards billed, over all items.
    pub fn call_count(&self) -> usize {
        self.items.iter().map(CostBreakdown::len).sum()
    }

    /// Average cost per billed shard; zero when nothing was billed.
    pub fn average_cost(&self) -> f64 {
        match self.call_count() {
            0 => 0.0,
            n => self.total_cost / n as f64,
        }
    }
}

/// Per-task cost summary of a workflow, in first-seen task order.
///
/// Serialized as a map of task name to cost, the layout earlier raw
/// reports were written in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSummary {
    tasks: Vec<TaskCost>,
}

impl Serialize for CostSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tasks.len()))?;
        for task in &self.tasks {
            map.serialize_entry(&task.name, task)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CostSummary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SummaryVisitor;

        impl<'de> Visitor<'de> for SummaryVisitor {
            type Value = CostSummary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task name to task cost")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<CostSummary, A::Error> {
                let mut summary = CostSummary::new();
                while let Some((name, mut task)) = access.next_entry::<String, TaskCost>()? {
                    task.name = name;
                    summary.insert(task);
                }
                Ok(summary)
            }
        }

        deserializer.deserialize_map(SummaryVisitor)
    }
}

impl CostSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[TaskCost] {
        &self.tasks
    }

    pub fn get(&self, task: &str) -> Option<&TaskCost> {
        self.tasks.iter().find(|t| t.name == task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total over every task, in nano-dollars.
    pub fn total_cost(&self) -> f64 {
        self.tasks.iter().map(|t| t.total_cost).sum()
    }

    /// Cpu / memory / disk totals over every task.
    pub fn resource_totals(&self) -> ResourceCost {
        self.tasks
            .iter()
            .fold(ResourceCost::default(), |acc, t| acc + ResourceCost::new(t.cpu, t.mem, t.disk))
    }

    /// Fold one visit's shard totals into the entry for `task`. Empty
    /// breakdowns are ignored.
    pub fn add_breakdown(&mut self, task: &str, breakdown: CostBreakdown) {
        if breakdown.is_empty() {
            return;
        }
        self.insert(TaskCost::from_breakdown(task, breakdown));
    }

    /// Merge another summary into this one: costs add, items concatenate,
    /// colliding task names share one entry.
    pub fn merge(&mut self, other: CostSummary) {
        for task in other.tasks {
            self.insert(task);
        }
    }

    fn insert(&mut self, task: TaskCost) {
        match self.tasks.iter_mut().find(|t| t.name == task.name) {
            Some(existing) => existing.absorb(task),
            None => self.tasks.push(task),
        }
    }
}
