use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::RelayError,
    ethereum::{
        abi::{AbiFetcher, AbiLoader, EtherscanClient},
        contract::ContractInvoker,
        provider::{ChainClient, RpcChainClient},
        registry::AbiRegistry,
        resolver::resolve,
        sanitize::sanitize_outputs,
        utils,
    },
};

const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    registry: Arc<AbiRegistry>,
    loader: Arc<AbiLoader>,
    invoker: Arc<ContractInvoker>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, fetcher: Arc<dyn AbiFetcher>, chain: Arc<dyn ChainClient>) -> Self {
        let registry = Arc::new(AbiRegistry::new());
        Self {
            loader: Arc::new(AbiLoader::new(fetcher, registry.clone())),
            invoker: Arc::new(ContractInvoker::new(chain)),
            registry,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadContractRequest {
    contract_address: String,
    #[serde(default)]
    abi: Option<Value>,
}

#[derive(Debug, Serialize)]
struct LoadContractResponse {
    message: String,
    abi: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallFunctionRequest {
    contract_address: String,
    function_name: String,
    #[serde(default = "empty_params")]
    params: Value,
    /// Only present so that a supplied key can be refused explicitly.
    #[serde(default)]
    private_key: Option<Value>,
}

fn empty_params() -> Value {
    Value::Array(Vec::new())
}

#[derive(Debug, Serialize)]
struct CallFunctionResponse {
    result: Value,
}

pub struct RelayServer {
    config: Config,
    chain: Arc<RpcChainClient>,
    state: AppState,
}

impl RelayServer {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(EtherscanClient::new(
            &config.explorer,
            config.timeouts.explorer(),
        )?);
        let chain = Arc::new(RpcChainClient::new(&config.network, config.timeouts.rpc())?);
        let state = AppState::new(config.clone(), fetcher, chain.clone());

        Ok(Self {
            config,
            chain,
            state,
        })
    }

    pub async fn run(self) -> Result<()> {
        // An unreachable node is not fatal: calls will report it per request.
        match self.chain.validate_connection().await {
            Ok(chain_id) if chain_id != self.config.network.chain_id => warn!(
                "RPC endpoint reports chain id {}, expected {} for {}",
                chain_id, self.config.network.chain_id, self.config.network.name
            ),
            Ok(_) => info!("Connected to {}", self.config.network.name),
            Err(e) => warn!("{}", e),
        }

        let addr = self.config.bind_addr()?;
        let app = router(self.state, &self.config);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server is running at http://{}", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

pub fn router(state: AppState, config: &Config) -> Router {
    // Permissive CORS: the bundled web UI and third-party pages call the relay directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/loadContract", post(load_contract))
        .route("/callFunction", post(call_function))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .with_state(state)
}

async fn load_contract(
    State(state): State<AppState>,
    payload: Result<Json<LoadContractRequest>, JsonRejection>,
) -> Result<Json<LoadContractResponse>, RelayError> {
    let Json(request) = payload?;
    let address = utils::validate_address(&request.contract_address)?;
    let abi = state.loader.load(address, request.abi).await?;

    Ok(Json(LoadContractResponse {
        message: "Contract loaded successfully".to_string(),
        abi,
    }))
}

async fn call_function(
    State(state): State<AppState>,
    payload: Result<Json<CallFunctionRequest>, JsonRejection>,
) -> Result<Json<CallFunctionResponse>, RelayError> {
    let Json(request) = payload?;
    if request.private_key.is_some() {
        return Err(RelayError::PrivateKeyRejected);
    }

    let address = utils::validate_address(&request.contract_address)?;
    let abi = state
        .registry
        .get(&address)
        .await
        .ok_or(RelayError::ContractNotLoaded)?;

    let resolved = resolve(&abi, &request.function_name)?;
    debug!(
        "Resolved {} as {:?}",
        resolved.function().signature(),
        resolved.state_mutability()
    );
    let outputs = state
        .invoker
        .invoke(address, &resolved, &request.params)
        .await?;

    let result = sanitize_outputs(&resolved.function().outputs, &outputs);
    debug!("Raw result: {:?}", outputs);
    debug!("Sanitized result: {}", result);

    Ok(Json(CallFunctionResponse { result }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "network": state.config.network.name,
        "chainId": state.config.network.chain_id,
        "loadedContracts": state.registry.len().await,
    }))
}
