use alloy::primitives::{Address, U256};
use std::str::FromStr;

use crate::error::RelayError;

/// Validates and normalizes an Ethereum address. Case is irrelevant: the
/// parsed `Address` is the canonical form used as the registry key.
pub fn validate_address(address: &str) -> Result<Address, RelayError> {
    let address = address.trim();

    if address.is_empty() {
        return Err(RelayError::InvalidAddress("address cannot be empty".into()));
    }

    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| {
            RelayError::InvalidAddress(format!(
                "'{}'. Ethereum addresses must start with '0x'",
                address
            ))
        })?;

    if hex_part.len() != 40 {
        return Err(RelayError::InvalidAddress(format!(
            "'{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RelayError::InvalidAddress(format!(
            "'{}'. Contains non-hexadecimal characters",
            address
        )));
    }

    // Mixed case is accepted without EIP-55 checksum verification.
    Address::from_str(hex_part).map_err(|e| RelayError::InvalidAddress(format!("'{}': {}", address, e)))
}

/// Parses an unsigned integer from decimal or `0x`-prefixed hex.
pub fn parse_u256(value: &str) -> Option<U256> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_str_radix(value, 10).ok(),
    }
}

/// Creates user-friendly error messages for common RPC errors. The node's
/// own message is always kept at the end.
pub fn interpret_rpc_error(error: &str) -> String {
    let hint = if error.contains("execution reverted") {
        "The contract function reverted execution. This usually means the function's requirements were not met or an assertion failed."
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Cannot connect to RPC endpoint. Check the RPC URL configuration."
    } else if error.contains("timeout") || error.contains("timed out") {
        "Request timed out. The RPC endpoint may be overloaded or unreachable."
    } else if error.contains("rate limit") || error.contains("429") {
        "Too many requests to the RPC endpoint. Try again in a few moments."
    } else if error.contains("method not found") {
        "The requested method is not supported by this RPC endpoint."
    } else {
        return format!("RPC error: {}", error);
    };

    format!("{} ({})", hint, error)
}
