use alloy::primitives::Address;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory map from contract address to the ABI loaded for it.
///
/// Entries are replaced whole on reload and live for the lifetime of the
/// process. Readers get a cloned snapshot, so a concurrent reload never
/// exposes a half-written definition.
#[derive(Debug, Default)]
pub struct AbiRegistry {
    contracts: RwLock<HashMap<Address, Value>>,
}

impl AbiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `abi` for `address`, returning the definition it replaced.
    pub async fn insert(&self, address: Address, abi: Value) -> Option<Value> {
        let previous = self.contracts.write().await.insert(address, abi);
        if previous.is_some() {
            debug!("Replaced ABI for {:?}", address);
        }
        previous
    }

    pub async fn get(&self, address: &Address) -> Option<Value> {
        self.contracts.read().await.get(address).cloned()
    }

    pub async fn len(&self) -> usize {
        self.contracts.read().await.len()
    }
}
