//! # cromulent-client
//!
//! HTTP clients feeding the cost estimator.
//!
//! - [`CromwellServer`] - Workflow metadata, status and abort on a Cromwell server
//! - [`GoogleServices`] - Billing SKUs, Compute machine types and Genomics operations
//!
//! Both implement the source traits of `cromulent-cost`, so a
//! [`cromulent_cost::CostEstimator`] can be built directly on them.

pub mod cromwell;
pub mod error;
pub mod google;
mod http;

pub use cromwell::{CromwellServer, WorkflowStatus};
pub use error::{ClientError, Result};
pub use google::{COMPUTE_ENGINE_SERVICE, GoogleServices};
