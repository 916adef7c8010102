use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::registry::AbiRegistry;
use crate::config::ExplorerConfig;
use crate::error::RelayError;

/// Source of contract ABIs for addresses the caller did not supply one for.
#[async_trait]
pub trait AbiFetcher: Send + Sync {
    async fn fetch_abi(&self, address: &Address) -> Result<Value, RelayError>;
}

/// Etherscan-compatible `module=contract&action=getabi` client
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

impl EtherscanClient {
    pub fn new(config: &ExplorerConfig, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::UpstreamError(format!("Failed to build explorer client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl AbiFetcher for EtherscanClient {
    async fn fetch_abi(&self, address: &Address) -> Result<Value, RelayError> {
        info!("Fetching ABI from explorer for {:?}", address);

        let address = format!("{:?}", address);
        let mut query = vec![
            ("module", "contract"),
            ("action", "getabi"),
            ("address", address.as_str()),
        ];
        if let Some(api_key) = &self.api_key {
            query.push(("apikey", api_key.as_str()));
        }

        let response: ExplorerResponse = self
            .client
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamError(format!("Failed to fetch from explorer: {}", e)))?
            .json()
            .await
            .map_err(|e| RelayError::UpstreamError(format!("Failed to parse explorer response: {}", e)))?;

        parse_explorer_response(response)
    }
}

fn parse_explorer_response(response: ExplorerResponse) -> Result<Value, RelayError> {
    if response.status != "1" {
        // On failure Etherscan puts the human readable reason in `result`.
        let reason = response
            .result
            .as_str()
            .map(str::to_string)
            .or(response.message)
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(RelayError::AbiUnavailable(reason));
    }

    let abi_str = response
        .result
        .as_str()
        .ok_or_else(|| RelayError::MalformedAbi("result is not a string".into()))?;

    let abi: Value =
        serde_json::from_str(abi_str).map_err(|e| RelayError::MalformedAbi(e.to_string()))?;

    if !abi.is_array() {
        return Err(RelayError::MalformedAbi("ABI is not a JSON array".into()));
    }

    Ok(abi)
}

/// Resolves ABIs and records them in the registry
pub struct AbiLoader {
    fetcher: Arc<dyn AbiFetcher>,
    registry: Arc<AbiRegistry>,
}

impl AbiLoader {
    pub fn new(fetcher: Arc<dyn AbiFetcher>, registry: Arc<AbiRegistry>) -> Self {
        Self { fetcher, registry }
    }

    /// Load the ABI for `address`, using `abi` verbatim when supplied and the
    /// explorer otherwise. The registry is only written on success.
    pub async fn load(&self, address: Address, abi: Option<Value>) -> Result<Value, RelayError> {
        let abi = match abi {
            Some(abi) => {
                debug!("Using caller-supplied ABI for {:?}", address);
                abi
            }
            None => self.fetcher.fetch_abi(&address).await?,
        };

        self.registry.insert(address, abi.clone()).await;
        info!("Loaded contract {:?}", address);
        Ok(abi)
    }
}
