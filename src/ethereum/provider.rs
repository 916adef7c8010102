use crate::config::NetworkConfig;
use crate::error::RelayError;
use crate::ethereum::utils;
use alloy::{
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    transports::{
        http::{Client, Http},
        RpcError,
    },
};
use async_trait::async_trait;
use std::future::IntoFuture;
use std::time::Duration;
use tracing::debug;

/// Read-only access to the configured chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_call` against `to` with raw calldata, returning the raw return data
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, RelayError>;
}

/// HTTP JSON-RPC client for the configured network
#[derive(Debug)]
pub struct RpcChainClient {
    provider: RootProvider<Http<Client>>,
    network: String,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(network_config: &NetworkConfig, timeout: Duration) -> anyhow::Result<Self> {
        let url = network_config.rpc_url.parse().map_err(|e| {
            anyhow::anyhow!("Invalid RPC URL '{}': {}", network_config.rpc_url, e)
        })?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            network: network_config.name.clone(),
            timeout,
        })
    }

    /// Validates network connectivity with detailed error information
    pub async fn validate_connection(&self) -> anyhow::Result<u64> {
        match tokio::time::timeout(self.timeout, self.provider.get_chain_id().into_future()).await {
            Ok(Ok(chain_id)) => Ok(chain_id),
            Ok(Err(e)) => Err(anyhow::anyhow!(
                "Cannot connect to network '{}': {}",
                self.network,
                utils::interpret_rpc_error(&e.to_string())
            )),
            Err(_) => Err(anyhow::anyhow!(
                "Cannot connect to network '{}': timed out after {:?}",
                self.network,
                self.timeout
            )),
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, RelayError> {
        let request = TransactionRequest::default().to(to).input(calldata.into());
        debug!("eth_call to {:?} on {}", to, self.network);

        match tokio::time::timeout(self.timeout, self.provider.call(&request).into_future()).await {
            Ok(Ok(bytes)) => Ok(bytes),
            // The node answered with an error object: revert, bad opcode, ...
            Ok(Err(RpcError::ErrorResp(payload))) => Err(RelayError::ExecutionError(
                utils::interpret_rpc_error(&payload.message.to_string()),
            )),
            Ok(Err(e)) => Err(RelayError::UpstreamError(utils::interpret_rpc_error(
                &e.to_string(),
            ))),
            Err(_) => Err(RelayError::UpstreamError(format!(
                "RPC call to {} timed out after {:?}",
                self.network, self.timeout
            ))),
        }
    }
}
