use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub explorer: ExplorerConfig,
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub explorer_secs: u64,
    pub rpc_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                name: "sepolia".to_string(),
                rpc_url: "https://eth-sepolia.g.alchemy.com/v2/demo".to_string(),
                chain_id: 11155111,
            },
            explorer: ExplorerConfig {
                api_url: "https://api-sepolia.etherscan.io/api".to_string(),
                api_key: None,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                static_dir: PathBuf::from("public"),
            },
            timeouts: TimeoutConfig {
                explorer_secs: 10,
                rpc_secs: 15,
            },
        }
    }
}

impl TimeoutConfig {
    pub fn explorer(&self) -> Duration {
        Duration::from_secs(self.explorer_secs)
    }

    pub fn rpc(&self) -> Duration {
        Duration::from_secs(self.rpc_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars(|key| std::env::var(key).ok());
        config
    }

    /// Apply environment variable overrides. `lookup` is `std::env::var` outside of tests.
    fn apply_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rpc_url) = lookup("RPC_URL") {
            tracing::info!("Using RPC_URL environment variable");
            self.network.rpc_url = rpc_url;
        }

        if let Some(api_key) = lookup("ALCHEMY_API_KEY") {
            if self.network.rpc_url.contains("alchemy.com/v2/demo") {
                self.network.rpc_url = self.network.rpc_url.replace("/demo", &format!("/{}", api_key));
                tracing::debug!("Updated {} RPC URL with API key", self.network.name);
            } else if self.network.rpc_url.contains("YOUR_API_KEY_HERE") {
                self.network.rpc_url = self.network.rpc_url.replace("YOUR_API_KEY_HERE", &api_key);
                tracing::debug!("Updated {} RPC URL with API key", self.network.name);
            }
        } else if self.network.rpc_url.contains("/demo") {
            tracing::warn!(
                "Using demo RPC endpoint for {}, set ALCHEMY_API_KEY or RPC_URL for better reliability",
                self.network.name
            );
        }

        if let Some(api_key) = lookup("ETHERSCAN_API_KEY") {
            tracing::debug!("ETHERSCAN_API_KEY found, will be used for ABI resolution");
            self.explorer.api_key = Some(api_key);
        } else if self.explorer.api_key.is_none() {
            tracing::warn!("No explorer API key configured, ABI lookups may be rate limited");
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value '{}'", port),
            }
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| anyhow!("Invalid bind address {}:{}: {}", self.server.host, self.server.port, e))
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("abi-relay").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# ABI relay configuration file

# The single chain this relay talks to
[network]
name = "sepolia"
rpc_url = "https://eth-sepolia.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 11155111

# Etherscan-compatible explorer used when /loadContract has no ABI
[explorer]
api_url = "https://api-sepolia.etherscan.io/api"
# api_key = "..."  # or set ETHERSCAN_API_KEY

[server]
host = "0.0.0.0"
port = 8080
static_dir = "public"

[timeouts]
explorer_secs = 10
rpc_secs = 15

# Environment variables that can be used:
# ETHERSCAN_API_KEY - Explorer API key for ABI resolution
# ALCHEMY_API_KEY - Your Alchemy API key (replaces YOUR_API_KEY_HERE above)
# RPC_URL - Overrides network.rpc_url
# PORT - Overrides server.port
"#;
        sample_config.to_string()
    }
}
