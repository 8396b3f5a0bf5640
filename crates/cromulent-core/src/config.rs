//! Configuration for cromulent.
//!
//! Configuration is read from `~/.cromulent/config.yaml` when it exists.
//! Every field has a default, so an empty or missing file is valid. The
//! Cromwell host and port can also be overridden through `CROMWELL_HOST`
//! and `CROMWELL_PORT`; command-line flags take precedence over both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Environment variable overriding the Cromwell host.
pub const CROMWELL_HOST_ENV: &str = "CROMWELL_HOST";

/// Environment variable overriding the Cromwell port.
pub const CROMWELL_PORT_ENV: &str = "CROMWELL_PORT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cromwell server connection
    pub cromwell: CromwellConfig,

    /// Google Cloud API access
    pub google: GoogleConfig,

    /// Estimate defaults
    pub estimate: EstimateConfig,

    /// Extra pricing lookup tables
    pub pricing: PricingConfig,
}

/// Cromwell server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CromwellConfig {
    pub host: String,
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CromwellConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            timeout_secs: 60,
        }
    }
}

impl CromwellConfig {
    /// Base URL of the Cromwell REST API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Google Cloud API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Name of the env var holding the Cloud Billing API key
    pub api_key_env: String,

    /// Name of the env var holding an OAuth2 access token (compute, genomics)
    pub access_token_env: String,

    pub billing_base_url: String,
    pub compute_base_url: String,
    pub genomics_base_url: String,

    /// Previously dumped SKU list, used instead of the billing API
    pub sku_list: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GCP_API_KEY".to_string(),
            access_token_env: "GCP_ACCESS_TOKEN".to_string(),
            billing_base_url: "https://cloudbilling.googleapis.com".to_string(),
            compute_base_url: "https://compute.googleapis.com".to_string(),
            genomics_base_url: "https://genomics.googleapis.com".to_string(),
            sku_list: None,
            timeout_secs: 60,
        }
    }
}

/// Defaults for the `estimate` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    /// One of `all`, `no-free`, `top-tier`, `max-price`
    pub tier_scheme: String,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            tier_scheme: "all".to_string(),
        }
    }
}

/// Additions to the built-in SKU lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Region (or super-region) -> formal billing region name
    pub regions: HashMap<String, String>,

    /// Machine family -> compute class name
    pub compute_classes: HashMap<String, String>,
}

impl Config {
    /// Default config file path: `~/.cromulent/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(CoreError::NoHomeDirectory)?;
        Ok(home.join(".cromulent").join("config.yaml"))
    }

    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// after the file is read.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| CoreError::io("reading config", &path, e))?;
            Self::from_yaml(&content, &path)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a YAML document. `path` is only used for error messages.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| CoreError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `CROMWELL_HOST` / `CROMWELL_PORT` overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var(CROMWELL_HOST_ENV) {
            if !host.is_empty() {
                self.cromwell.host = host;
            }
        }
        if let Ok(port) = std::env::var(CROMWELL_PORT_ENV) {
            self.cromwell.port = port.parse().map_err(|_| {
                CoreError::validation(format!("{} is not a valid port: '{}'", CROMWELL_PORT_ENV, port))
            })?;
        }
        Ok(())
    }

    /// Set the Cromwell host.
    pub fn with_cromwell_host(mut self, host: impl Into<String>) -> Self {
        self.cromwell.host = host.into();
        self
    }

    /// Set the Cromwell port.
    pub fn with_cromwell_port(mut self, port: u16) -> Self {
        self.cromwell.port = port;
        self
    }

    /// Set the SKU list file.
    pub fn with_sku_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.google.sku_list = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clear_env() {
        // SAFETY: env-mutating tests are serialized
        unsafe {
            std::env::remove_var(CROMWELL_HOST_ENV);
            std::env::remove_var(CROMWELL_PORT_ENV);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cromwell.base_url(), "http://localhost:8000");
        assert_eq!(config.google.api_key_env, "GCP_API_KEY");
        assert_eq!(config.estimate.tier_scheme, "all");
        assert!(config.pricing.regions.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cromwell:
  host: cromwell.internal
estimate:
  tier_scheme: no-free
pricing:
  regions:
    us-west4: Las Vegas
"#;
        let config = Config::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.cromwell.host, "cromwell.internal");
        assert_eq!(config.cromwell.port, 8000);
        assert_eq!(config.estimate.tier_scheme, "no-free");
        assert_eq!(config.pricing.regions.get("us-west4").map(String::as_str), Some("Las Vegas"));
        assert_eq!(config.google.billing_base_url, "https://cloudbilling.googleapis.com");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("   \n", Path::new("empty.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Config::from_yaml("cromwell: [1, 2", Path::new("bad.yaml")).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_file_then_env_override() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cromwell:\n  host: from-file\n  port: 9000").unwrap();

        // SAFETY: env-mutating tests are serialized
        unsafe { std::env::set_var(CROMWELL_PORT_ENV, "8123") };
        let config = Config::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.cromwell.host, "from-file");
        assert_eq!(config.cromwell.port, 8123);
    }

    #[test]
    #[serial]
    fn test_bad_port_env() {
        clear_env();
        // SAFETY: env-mutating tests are serialized
        unsafe { std::env::set_var(CROMWELL_PORT_ENV, "eighty") };
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        clear_env();

        assert!(matches!(result, Err(CoreError::ConfigValidation { .. })));
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_cromwell_host("10.0.0.5")
            .with_cromwell_port(8080)
            .with_sku_list("/tmp/skus.json");
        assert_eq!(config.cromwell.base_url(), "http://10.0.0.5:8080");
        assert_eq!(config.google.sku_list, Some(PathBuf::from("/tmp/skus.json")));
    }
}
