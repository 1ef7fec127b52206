//! Configuration types for Visura components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

// =============================================================================
// HTTP configuration
// =============================================================================

/// HTTP client configuration for provider and document calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Read timeout for a single request.
    pub read_timeout: Duration,
    /// Connect timeout for a single request.
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    /// The ceiling used for the slowest provider's document downloads.
    pub fn slow_provider() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Document validation configuration
// =============================================================================

/// Validation thresholds for downloaded document payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Minimum accepted payload size in bytes.
    pub min_bytes: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self { min_bytes: 1024 }
    }
}

// =============================================================================
// Document fetch policy
// =============================================================================

/// How a provider's document-fetch stage treats per-document failures.
///
/// This is explicit per-provider configuration, not a property of which
/// code path happens to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Any single download failure fails the whole stage.
    #[default]
    AllOrNothing,
    /// Per-document failures are logged and skipped; the stage fails only
    /// if zero documents were retrieved out of a non-empty reference set.
    /// An explicitly empty reference set is not a failure.
    BestEffort,
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllOrNothing => write!(f, "all_or_nothing"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

impl FromStr for FetchPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_or_nothing" => Ok(Self::AllOrNothing),
            "best_effort" => Ok(Self::BestEffort),
            _ => Err(AppError::ConfigError(format!(
                "Unknown fetch policy: '{}'. Valid options: all_or_nothing, best_effort",
                s
            ))),
        }
    }
}

// =============================================================================
// Provider configuration (providers.toml)
// =============================================================================

/// Default enabled status when not specified in configuration.
fn default_enabled() -> bool {
    true
}

/// Root configuration structure for providers.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Array of provider configurations.
    pub providers: Vec<ProviderEntry>,
}

impl ProvidersConfig {
    /// Returns only enabled providers.
    pub fn enabled_providers(&self) -> Vec<&ProviderEntry> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    /// Find a provider by canonical name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// A single provider entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Canonical provider name; doubles as the fetch-status map key.
    pub name: String,

    /// Base URL of the provider API.
    pub base_url: String,

    /// Endpoint path template with a `{company_ref}` placeholder.
    ///
    /// Example: `"companies/{company_ref}/clearance"`.
    pub path_template: String,

    /// Environment variable holding the bearer credential.
    ///
    /// Providers without this entry are called unauthenticated. Providers
    /// with it fail fast with a missing-credentials error (never retried)
    /// when the variable is absent.
    pub credentials_env: Option<String>,

    /// Document fetch policy. Defaults to all-or-nothing.
    #[serde(default)]
    pub fetch_policy: FetchPolicy,

    /// Read timeout override in seconds for this provider's downloads.
    pub read_timeout_secs: Option<u64>,

    /// Connect timeout override in seconds.
    pub connect_timeout_secs: Option<u64>,

    /// Whether this provider is called during application processing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional description of the provider.
    pub description: Option<String>,
}

impl ProviderEntry {
    /// Effective HTTP configuration for this provider.
    pub fn http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            read_timeout: self
                .read_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            connect_timeout: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "providers.toml";

/// Returns the default configuration directory path.
///
/// Uses XDG Base Directory specification: `~/.config/visura/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("visura"))
}

/// Returns the default configuration file path.
///
/// Path: `~/.config/visura/providers.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Default template content for a new providers.toml file.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Visura Provider Configuration
#
# Usage:
#   visura providers                 # List configured providers
#   visura fetch <application> <provider>
#   visura worker                    # Run the fetch worker
#
# Set enabled = false to skip a provider during application processing.
# fetch_policy is "all_or_nothing" (default) or "best_effort".

[[providers]]
name = "tax_registry"
base_url = "https://api.tax-registry.example"
path_template = "companies/{company_ref}/clearance"
credentials_env = "TAX_REGISTRY_TOKEN"
description = "Tax clearance certificates"

[[providers]]
name = "social_security"
base_url = "https://api.social-security.example"
path_template = "employers/{company_ref}/certificate"
credentials_env = "SOCIAL_SECURITY_TOKEN"
description = "Social-security clearance certificates"

[[providers]]
name = "company_register"
base_url = "https://api.company-register.example"
path_template = "register/{company_ref}"
credentials_env = "COMPANY_REGISTER_TOKEN"
description = "Company master data"

[[providers]]
name = "professional_certs"
base_url = "https://api.certification-body.example"
path_template = "companies/{company_ref}/certificates"
credentials_env = "PROFESSIONAL_CERTS_TOKEN"
fetch_policy = "best_effort"
# Slowest provider: generous document timeouts.
read_timeout_secs = 60
connect_timeout_secs = 30
description = "Professional certification body"

[[providers]]
name = "retirement_state_fund"
base_url = "https://api.state-fund.example"
path_template = "contributors/{company_ref}/proof"
credentials_env = "RETIREMENT_STATE_FUND_TOKEN"
description = "State retirement fund contribution proof"

[[providers]]
name = "retirement_industry_fund"
base_url = "https://api.industry-fund.example"
path_template = "members/{company_ref}/proof"
credentials_env = "RETIREMENT_INDUSTRY_FUND_TOKEN"
description = "Industry retirement fund contribution proof"
"#;

/// Load provider configuration from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses the default XDG path.
///
/// # Returns
/// * `Ok(Some(config))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration file found at the default path
/// * `Err(e)` - Configuration file exists but is invalid
///
/// # Behavior
/// If no configuration file exists at the default path, a commented
/// template file is created so operators can start from a working example.
pub fn load_providers_config(path: Option<PathBuf>) -> Result<Option<ProvidersConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            match create_default_config(&config_path) {
                Ok(()) => {
                    tracing::info!(
                        path = %config_path.display(),
                        "Created default provider configuration template"
                    );
                }
                Err(e) => {
                    tracing::warn!("Could not create default config template: {}", e);
                    return Ok(None);
                }
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: ProvidersConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(config))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
}

// =============================================================================
// Webhook configuration
// =============================================================================

/// Outbound webhook configuration for one integrating system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Delivery endpoint URL.
    pub endpoint: String,
    /// Environment variable holding the per-integrator signing secret.
    pub secret_env: String,
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    15
}

impl WebhookConfig {
    /// Resolves the signing secret from the environment.
    ///
    /// A missing secret is a configuration error, never retried.
    pub fn secret(&self) -> Result<String, AppError> {
        std::env::var(&self.secret_env).map_err(|_| {
            AppError::ConfigError(format!(
                "Webhook signing secret not set: {}",
                self.secret_env
            ))
        })
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
