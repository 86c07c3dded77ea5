//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
    /// Solana RPC configuration
    pub solana: SolanaConfig,
    /// Social search configuration
    pub social: SocialConfig,
    /// Narrative generation configuration
    pub narrative: NarrativeConfig,
    /// Trace shipping configuration
    pub shipping: ShippingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shared per-stage timeout for every upstream adapter call
    #[serde(with = "humantime_serde")]
    pub stage_timeout: Duration,
    /// Signature fetch limit applied when a request does not override it
    pub default_signatures: u32,
    /// Hard ceiling on the signature fetch limit
    pub max_signatures: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(25),
            default_signatures: 50,
            max_signatures: 500,
        }
    }
}

/// Solana RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolanaConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Signatures per getTransaction batch request
    pub batch_size: usize,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            batch_size: 12,
        }
    }
}

/// Social search configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Enable the social enrichment stage
    pub enabled: bool,
    /// X API bearer token; supports `${VAR}` expansion
    pub bearer_token: Option<String>,
    /// Maximum mentions to return
    pub max_results: u32,
}

/// Narrative generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Enable the narrative stage
    pub enabled: bool,
    /// Bedrock API key; supports `${VAR}` expansion
    pub api_key: Option<String>,
    /// Model identifier
    pub model_id: String,
    /// AWS region hosting the model endpoint
    pub region: String,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model_id: "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            region: "us-west-2".to_string(),
        }
    }
}

/// Trace shipping configuration (out-of-band observability, best-effort)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingConfig {
    /// Enable trace shipping
    pub enabled: bool,
    /// Log-intake API key; supports `${VAR}` expansion
    pub api_key: Option<String>,
    /// Log-intake site
    pub site: String,
    /// Service tag
    pub service: String,
    /// Environment tag
    pub env: String,
    /// Version tag
    pub version: String,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            site: "datadoghq.com".to_string(),
            service: "recon-gateway".to_string(),
            env: "dev".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (RECON_ prefix)
        figment = figment.merge(Env::prefixed("RECON_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        // Expand ${VAR} in secret-bearing values
        config.expand_env_vars();

        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in config values
    fn expand_env_vars(&mut self) {
        // Pattern: ${VAR} or ${VAR:-default}
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static pattern");

        for slot in [
            &mut self.social.bearer_token,
            &mut self.narrative.api_key,
            &mut self.shipping.api_key,
        ] {
            if let Some(value) = slot.as_mut() {
                *value = Self::expand_string(&re, value);
            }
        }
        self.solana.rpc_url = Self::expand_string(&re, &self.solana.rpc_url);
    }

    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures<'_>| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(v) => v,
                Err(_) => caps.get(2).map_or(String::new(), |d| d.as_str().to_string()),
            }
        })
        .into_owned()
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.max_signatures == 0 {
            return Err(Error::Config(
                "pipeline.max_signatures must be positive".to_string(),
            ));
        }
        if self.pipeline.default_signatures > self.pipeline.max_signatures {
            return Err(Error::Config(format!(
                "pipeline.default_signatures ({}) exceeds pipeline.max_signatures ({})",
                self.pipeline.default_signatures, self.pipeline.max_signatures
            )));
        }
        if self.solana.batch_size == 0 {
            return Err(Error::Config(
                "solana.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
