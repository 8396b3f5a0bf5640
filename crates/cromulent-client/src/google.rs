//! Google Cloud API client.
//!
//! Three APIs are used:
//! - Cloud Billing (`services.skus.list`) for the Compute Engine price list,
//!   authenticated with an API key
//! - Compute Engine (`machineTypes.list`) for the predefined shapes of a zone
//! - Genomics Pipelines v2alpha1 (`operations.get`) for job metadata
//!
//! Compute and Genomics calls send an OAuth2 bearer token.

use std::path::PathBuf;

use ::async_trait::async_trait;
use cromulent_core::config::GoogleConfig;
use cromulent_cost::{
    BillingCatalogSource, CostError, MachineType, MachineTypeSource, OperationSource, SkuCatalog,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::http::{build_client, send_json};

/// Billing service whose SKUs price Compute Engine usage.
pub const COMPUTE_ENGINE_SERVICE: &str = "Compute Engine";

#[derive(Debug, Clone, Copy)]
enum Auth {
    ApiKey,
    Bearer,
}

/// Google Cloud API access.
#[derive(Debug, Clone)]
pub struct GoogleServices {
    client: reqwest::Client,
    billing_base_url: String,
    compute_base_url: String,
    genomics_base_url: String,
    api_key_env: String,
    api_key: Option<String>,
    access_token_env: String,
    access_token: Option<String>,
    sku_list: Option<PathBuf>,
}

impl GoogleServices {
    /// Build from configuration, reading credentials from the configured
    /// environment variables. Missing credentials only fail the calls that
    /// need them.
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let read_env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            billing_base_url: config.billing_base_url.trim_end_matches('/').to_string(),
            compute_base_url: config.compute_base_url.trim_end_matches('/').to_string(),
            genomics_base_url: config.genomics_base_url.trim_end_matches('/').to_string(),
            api_key: read_env(&config.api_key_env),
            api_key_env: config.api_key_env.clone(),
            access_token: read_env(&config.access_token_env),
            access_token_env: config.access_token_env.clone(),
            sku_list: config.sku_list.clone(),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Read SKUs from a dumped list instead of the billing API.
    pub fn with_sku_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.sku_list = Some(path.into());
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder, auth: Auth) -> Result<reqwest::RequestBuilder> {
        match auth {
            Auth::ApiKey => {
                let key = self.api_key.as_deref().ok_or_else(|| ClientError::MissingCredential {
                    env: self.api_key_env.clone(),
                })?;
                Ok(request.query(&[("key", key)]))
            }
            Auth::Bearer => {
                let token = self
                    .access_token
                    .as_deref()
                    .ok_or_else(|| ClientError::MissingCredential {
                        env: self.access_token_env.clone(),
                    })?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// GET every page of a list endpoint, concatenating `items_key` arrays.
    async fn get_paged(&self, url: &str, items_key: &str, auth: Auth) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.authorize(self.client.get(url), auth)?;
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: Value = send_json(request, url).await?;
            if let Some(page_items) = page.get(items_key).and_then(Value::as_array) {
                items.extend(page_items.iter().cloned());
            }

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
            debug!(url, fetched = items.len(), "fetching next page");
        }
        Ok(items)
    }

    /// Resource name (`services/XXXX-...`) of a billing service.
    pub async fn billing_service(&self, display_name: &str) -> Result<String> {
        let url = format!("{}/v1/services", self.billing_base_url);
        let services = self.get_paged(&url, "services", Auth::ApiKey).await?;
        services
            .iter()
            .find(|s| s.get("displayName").and_then(Value::as_str) == Some(display_name))
            .and_then(|s| s.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| ClientError::ServiceNotFound(display_name.to_string()))
    }

    /// Every Compute Engine SKU, keyed by description. Later SKUs win when
    /// descriptions collide.
    pub async fn compute_engine_skus(&self) -> Result<Map<String, Value>> {
        info!("fetching the Compute Engine price list from Google Cloud");
        let service = self.billing_service(COMPUTE_ENGINE_SERVICE).await?;
        let url = format!("{}/v1/{}/skus", self.billing_base_url, service);
        let skus = self.get_paged(&url, "skus", Auth::ApiKey).await?;

        let mut keyed = Map::new();
        for sku in skus {
            if let Some(description) = sku.get("description").and_then(Value::as_str) {
                keyed.insert(description.to_string(), sku.clone());
            }
        }
        info!(skus = keyed.len(), "fetched price list");
        Ok(keyed)
    }

    /// Predefined machine types of a zone.
    pub async fn list_machine_types(&self, project: &str, zone: &str) -> Result<Vec<MachineType>> {
        let url = format!(
            "{}/compute/v1/projects/{}/zones/{}/machineTypes",
            self.compute_base_url, project, zone
        );
        let items = self.get_paged(&url, "items", Auth::Bearer).await?;
        let types = items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<MachineType>, _>>()?;
        debug!(project, zone, count = types.len(), "fetched machine types");
        Ok(types)
    }

    /// A Genomics operation by its full name (`projects/.../operations/...`).
    pub async fn operation(&self, name: &str) -> Result<Value> {
        let url = format!("{}/v2alpha1/{}", self.genomics_base_url, name.trim_start_matches('/'));
        let request = self.authorize(self.client.get(&url), Auth::Bearer)?;
        send_json(request, &url).await
    }
}

#[async_trait]
impl BillingCatalogSource for GoogleServices {
    async fn sku_catalog(&self) -> cromulent_cost::Result<SkuCatalog> {
        if let Some(path) = &self.sku_list {
            info!(path = %path.display(), "reading the price list from file");
            return SkuCatalog::from_file(path);
        }
        let skus = self
            .compute_engine_skus()
            .await
            .map_err(|e| CostError::CatalogFetch(e.to_string()))?;
        SkuCatalog::from_billing_skus(Value::Object(skus))
    }
}

#[async_trait]
impl MachineTypeSource for GoogleServices {
    async fn machine_types(&self, project: &str, zone: &str) -> cromulent_cost::Result<Vec<MachineType>> {
        self.list_machine_types(project, zone)
            .await
            .map_err(|e| CostError::MachineTypeFetch {
                project: project.to_string(),
                zone: zone.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl OperationSource for GoogleServices {
    async fn operation_metadata(&self, job_id: &str) -> cromulent_cost::Result<Value> {
        self.operation(job_id).await.map_err(|e| CostError::OperationFetch {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })
    }
}
