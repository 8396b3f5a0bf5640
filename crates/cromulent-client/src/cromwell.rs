//! Cromwell REST API client.
//!
//! ## Example
//!
//! ```no_run
//! use cromulent_client::CromwellServer;
//! use cromulent_core::config::CromwellConfig;
//!
//! # async fn example() -> cromulent_client::Result<()> {
//! let server = CromwellServer::from_config(&CromwellConfig::default())?;
//! if server.is_accessible().await {
//!     let status = server.status("0f3c2b8e-2d2a-4b7e-9d1e-8f5c1a2b3c4d").await?;
//!     println!("{}: {}", status.id, status.status);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use ::async_trait::async_trait;
use cromulent_core::config::CromwellConfig;
use cromulent_cost::{CostError, WorkflowMetadata, WorkflowMetadataSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{build_client, send_json};

/// `{"id": ..., "status": ...}` as returned by the status and abort endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub id: String,
    pub status: String,
}

/// A Cromwell server.
#[derive(Debug, Clone)]
pub struct CromwellServer {
    base_url: String,
    client: reqwest::Client,
}

impl CromwellServer {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            client: build_client(timeout_secs)?,
        })
    }

    pub fn from_config(config: &CromwellConfig) -> Result<Self> {
        Self::new(config.base_url(), config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn workflow_url(&self, id: &str, endpoint: &str) -> String {
        format!("{}/api/workflows/v1/{}/{}", self.base_url, id, endpoint)
    }

    /// Whether the engine answers its version endpoint.
    pub async fn is_accessible(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!(url = %self.base_url, %version, "cromwell server is up");
                true
            }
            Err(e) => {
                debug!(url = %self.base_url, error = %e, "cromwell server not accessible");
                false
            }
        }
    }

    /// Engine version string.
    pub async fn version(&self) -> Result<String> {
        let url = format!("{}/engine/v1/version", self.base_url);
        let body: Value = send_json(self.client.get(&url), &url).await?;
        Ok(body
            .get("cromwell")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Raw metadata document, sub-workflows not expanded.
    pub async fn metadata_json(&self, id: &str) -> Result<Value> {
        let url = self.workflow_url(id, "metadata");
        info!(workflow = id, "fetching workflow metadata");
        send_json(
            self.client.get(&url).query(&[("expandSubWorkflows", "false")]),
            &url,
        )
        .await
    }

    /// Parsed metadata document, sub-workflows not expanded.
    pub async fn metadata(&self, id: &str) -> Result<WorkflowMetadata> {
        let json = self.metadata_json(id).await?;
        Ok(serde_json::from_value(json)?)
    }

    pub async fn status(&self, id: &str) -> Result<WorkflowStatus> {
        let url = self.workflow_url(id, "status");
        send_json(self.client.get(&url), &url).await
    }

    /// Number of call executions per execution status.
    pub async fn execution_status_summary(&self, id: &str) -> Result<BTreeMap<String, usize>> {
        let url = self.workflow_url(id, "metadata");
        let body: Value = send_json(
            self.client.get(&url).query(&[("includeKey", "executionStatus")]),
            &url,
        )
        .await?;

        let mut summary = BTreeMap::new();
        let calls = body.get("calls").and_then(Value::as_object);
        for executions in calls.into_iter().flat_map(|c| c.values()) {
            for execution in executions.as_array().into_iter().flatten() {
                if let Some(state) = execution.get("executionStatus").and_then(Value::as_str) {
                    *summary.entry(state.to_string()).or_insert(0) += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Metadata restricted to execution status, inputs and outputs.
    pub async fn inputs_outputs(&self, id: &str) -> Result<Value> {
        let url = self.workflow_url(id, "metadata");
        send_json(
            self.client.get(&url).query(&[
                ("includeKey", "executionStatus"),
                ("includeKey", "inputs"),
                ("includeKey", "outputs"),
            ]),
            &url,
        )
        .await
    }

    pub async fn abort(&self, id: &str) -> Result<WorkflowStatus> {
        let url = self.workflow_url(id, "abort");
        info!(workflow = id, "aborting workflow");
        send_json(self.client.post(&url), &url).await
    }
}

#[async_trait]
impl WorkflowMetadataSource for CromwellServer {
    async fn workflow_metadata(&self, id: &str) -> cromulent_cost::Result<WorkflowMetadata> {
        self.metadata(id).await.map_err(|e| CostError::WorkflowFetch {
            id: id.to_string(),
            message: e.to_string(),
        })
    }
}
