use alloy::json_abi::{Function, StateMutability};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::RelayError;

/// A function entry located in a loaded ABI, tagged by whether calling it
/// changes chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFunction {
    /// `view` or `pure`
    Read(Function),
    /// `nonpayable` or `payable`
    Write(Function),
}

impl ResolvedFunction {
    pub fn function(&self) -> &Function {
        match self {
            ResolvedFunction::Read(f) | ResolvedFunction::Write(f) => f,
        }
    }

    pub fn state_mutability(&self) -> StateMutability {
        self.function().state_mutability
    }
}

/// Find `function_name` in `abi`.
///
/// A bare name picks the first function entry with that name in declaration
/// order. A full signature such as `transfer(address,uint256)` picks that
/// exact overload.
pub fn resolve(abi: &Value, function_name: &str) -> Result<ResolvedFunction, RelayError> {
    let entries = abi.as_array().ok_or_else(|| RelayError::InvalidAbiEntry {
        function: function_name.to_string(),
        reason: "loaded ABI is not an array".into(),
    })?;

    let functions = entries
        .iter()
        .filter_map(Value::as_object)
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("function"));

    let found = if let Some((bare_name, _)) = function_name.split_once('(') {
        let mut found = None;
        for entry in functions.filter(|entry| entry.get("name").and_then(Value::as_str) == Some(bare_name)) {
            let function = parse_entry(entry, function_name)?;
            if function.signature() == function_name {
                found = Some(function);
                break;
            }
        }
        found
    } else {
        let candidates: Vec<&Map<String, Value>> = functions
            .filter(|entry| entry.get("name").and_then(Value::as_str) == Some(function_name))
            .collect();

        if candidates.len() > 1 {
            let signatures: Vec<String> = candidates
                .iter()
                .filter_map(|entry| parse_entry(entry, function_name).ok())
                .map(|f| f.signature())
                .collect();
            warn!(
                "Function '{}' is overloaded ({}), using the first declaration. Pass a full signature to choose another.",
                function_name,
                signatures.join(", ")
            );
        }

        match candidates.first() {
            Some(entry) => Some(parse_entry(entry, function_name)?),
            None => None,
        }
    };

    let function = found.ok_or_else(|| not_found(entries, function_name))?;

    Ok(match function.state_mutability {
        StateMutability::View | StateMutability::Pure => ResolvedFunction::Read(function),
        StateMutability::NonPayable | StateMutability::Payable => ResolvedFunction::Write(function),
    })
}

fn not_found(entries: &[Value], function_name: &str) -> RelayError {
    let available: Vec<&str> = entries
        .iter()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("function"))
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .collect();

    if available.is_empty() {
        RelayError::FunctionNotFound(format!(
            "Function '{}' not found. The contract ABI contains no functions.",
            function_name
        ))
    } else {
        RelayError::FunctionNotFound(format!(
            "Function '{}' not found in ABI. Available functions: {}",
            function_name,
            available.join(", ")
        ))
    }
}

fn mutability_name(mutability: StateMutability) -> &'static str {
    match mutability {
        StateMutability::Pure => "pure",
        StateMutability::View => "view",
        StateMutability::NonPayable => "nonpayable",
        StateMutability::Payable => "payable",
    }
}

/// Parse a raw ABI entry into a typed function. Legacy `constant`/`payable`
/// flags are honoured when `stateMutability` is absent.
fn parse_entry(entry: &Map<String, Value>, function_name: &str) -> Result<Function, RelayError> {
    let invalid = |reason: String| RelayError::InvalidAbiEntry {
        function: function_name.to_string(),
        reason,
    };

    let mutability = match entry.get("stateMutability") {
        Some(Value::String(s)) => match s.as_str() {
            "view" => StateMutability::View,
            "pure" => StateMutability::Pure,
            "nonpayable" => StateMutability::NonPayable,
            "payable" => StateMutability::Payable,
            other => return Err(invalid(format!("unknown stateMutability '{}'", other))),
        },
        Some(other) => return Err(invalid(format!("stateMutability must be a string, got {}", other))),
        None => {
            let flag = |key: &str| entry.get(key).and_then(Value::as_bool).unwrap_or(false);
            if flag("constant") {
                StateMutability::View
            } else if flag("payable") {
                StateMutability::Payable
            } else {
                StateMutability::NonPayable
            }
        }
    };

    let mut normalized = entry.clone();
    normalized.remove("constant");
    normalized.remove("payable");
    normalized
        .entry("inputs")
        .or_insert_with(|| Value::Array(Vec::new()));
    normalized
        .entry("outputs")
        .or_insert_with(|| Value::Array(Vec::new()));
    normalized.insert(
        "stateMutability".to_string(),
        Value::String(mutability_name(mutability).to_string()),
    );

    let mut function: Function =
        serde_json::from_value(Value::Object(normalized)).map_err(|e| invalid(e.to_string()))?;
    function.state_mutability = mutability;

    // Surface unknown parameter types now instead of at encode time.
    for param in function.inputs.iter().chain(function.outputs.iter()) {
        alloy::dyn_abi::Specifier::<alloy::dyn_abi::DynSolType>::resolve(param)
            .map_err(|e| invalid(format!("parameter '{}' of type '{}': {}", param.name, param.ty, e)))?;
    }

    Ok(function)
}
