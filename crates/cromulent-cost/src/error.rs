//! Error types for cost estimation.
//!
//! Every variant except the fetch wrappers is fatal for the whole estimate
//! and names the lookup key or id that could not be resolved.

use thiserror::Error;

/// Cost estimation errors.
#[derive(Error, Debug)]
pub enum CostError {
    /// A computed SKU description is not in the billing catalog
    #[error("no SKU in the billing catalog for '{key}'")]
    SkuNotFound {
        /// The exact lookup key that missed
        key: String,
    },

    /// Neither the region nor its super-region has a billing region name
    #[error("no billing region known for zone '{zone}' (tried '{region}' and '{super_region}')")]
    UnknownRegion {
        zone: String,
        region: String,
        super_region: String,
    },

    /// A predefined machine family has no compute class mapping
    #[error("no compute class known for machine type '{machine}'")]
    UnknownComputeClass { machine: String },

    /// Disk type outside the disk class table
    #[error("unknown disk class '{disk_class}'")]
    UnknownDiskClass { disk_class: String },

    /// CPU and RAM SKUs are only priced with a single tier
    #[error("SKU '{sku}' has {tiers} price tiers; tiered cpu/ram pricing is not supported")]
    UnsupportedTieredPricing { sku: String, tiers: usize },

    /// SKU carries no price tiers at all
    #[error("SKU '{sku}' has no pricing tiers")]
    EmptyPricing { sku: String },

    /// Tier scheme name outside `all`, `no-free`, `top-tier`, `max-price`
    #[error("unknown tier scheme '{0}' (expected one of: all, no-free, top-tier, max-price)")]
    UnknownTierScheme(String),

    /// Call-caching result string not in `... ... <wf>:<task>:<shard>` form
    #[error("malformed call-cache reference: '{0}'")]
    MalformedCacheReference(String),

    /// The call a cache reference points at has no job id
    #[error("call-cache origin {workflow_id} {task_name}:{shard_index} has no job id")]
    CacheTargetMissing {
        workflow_id: String,
        task_name: String,
        shard_index: i64,
    },

    /// Operation metadata is missing a required field
    #[error("malformed operation metadata for job '{job_id}': {reason}")]
    MalformedOperation { job_id: String, reason: String },

    /// Machine type is not `<family>-<cores>-<memoryMiB>`
    #[error("cannot parse machine shape from '{0}'")]
    MachineShape(String),

    /// Workflow metadata source failed
    #[error("failed to fetch workflow metadata for '{id}': {message}")]
    WorkflowFetch { id: String, message: String },

    /// Operation metadata source failed
    #[error("failed to fetch operation metadata for '{job_id}': {message}")]
    OperationFetch { job_id: String, message: String },

    /// Machine type catalog source failed
    #[error("failed to fetch machine types for project '{project}' zone '{zone}': {message}")]
    MachineTypeFetch {
        project: String,
        zone: String,
        message: String,
    },

    /// Billing catalog source failed
    #[error("failed to fetch the billing catalog: {0}")]
    CatalogFetch(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file reading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CostError {
    /// Check if this error came from an unreachable or failing source.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            CostError::WorkflowFetch { .. }
                | CostError::OperationFetch { .. }
                | CostError::MachineTypeFetch { .. }
                | CostError::CatalogFetch(_)
        )
    }

    /// Check if this error is a pricing lookup miss.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            CostError::SkuNotFound { .. }
                | CostError::UnknownRegion { .. }
                | CostError::UnknownComputeClass { .. }
                | CostError::UnknownDiskClass { .. }
        )
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self {
            CostError::SkuNotFound { key } => format!(
                "The billing catalog has no entry named '{}'. The SKU list may be stale; re-run 'cromulent sku-list'.",
                key
            ),
            CostError::UnknownRegion { zone, .. } => format!(
                "Zone '{}' has no billing region mapping. Add one under 'pricing.regions' in the config.",
                zone
            ),
            CostError::UnknownComputeClass { machine } => format!(
                "Machine type '{}' has no compute class. Add its family under 'pricing.compute_classes'.",
                machine
            ),
            CostError::UnknownTierScheme(name) => format!(
                "'{}' is not a tier scheme. Use one of: all, no-free, top-tier, max-price.",
                name
            ),
            _ => format!("Error: {}", self),
        }
    }
}

/// Result type for cost estimation.
pub type Result<T> = std::result::Result<T, CostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_not_found_names_key() {
        let err = CostError::SkuNotFound {
            key: "Preemptible Custom Instance Core running in Virginia".into(),
        };
        assert!(err.to_string().contains("Preemptible Custom Instance Core running in Virginia"));
        assert!(err.is_lookup_error());
        assert!(!err.is_fetch_error());
    }

    #[test]
    fn test_fetch_classification() {
        let err = CostError::WorkflowFetch {
            id: "wf-1".into(),
            message: "connection refused".into(),
        };
        assert!(err.is_fetch_error());
        assert!(err.friendly_message().contains("wf-1"));
    }

    #[test]
    fn test_unknown_scheme_message() {
        let err = CostError::UnknownTierScheme("cheapest".into());
        assert!(err.friendly_message().contains("no-free"));
    }
}
