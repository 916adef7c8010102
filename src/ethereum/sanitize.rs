//! Conversion of decoded ABI values into plain JSON.
//!
//! JSON numbers cannot hold 256-bit integers exactly, so every integer leaves
//! as its decimal string. Nothing here produces a `Value::Number`.

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::Param;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Convert a single decoded value. Tuples become arrays.
pub fn sanitize(value: &DynSolValue) -> Value {
    sanitize_with(value, None)
}

/// Convert a function's decoded outputs using their ABI declarations.
///
/// No outputs yield `null` and a single output yields that value. Several
/// outputs yield an object when every output has a distinct name, an array
/// otherwise. Named tuple components follow the same rule.
pub fn sanitize_outputs(params: &[Param], values: &[DynSolValue]) -> Value {
    match values {
        [] => Value::Null,
        [single] => sanitize_with(single, params.first()),
        _ => sanitize_sequence(params, values),
    }
}

fn sanitize_sequence(params: &[Param], values: &[DynSolValue]) -> Value {
    if params.len() == values.len() && has_distinct_names(params) {
        let object: Map<String, Value> = params
            .iter()
            .zip(values)
            .map(|(param, value)| (param.name.clone(), sanitize_with(value, Some(param))))
            .collect();
        return Value::Object(object);
    }

    Value::Array(
        values
            .iter()
            .enumerate()
            .map(|(i, value)| sanitize_with(value, params.get(i)))
            .collect(),
    )
}

fn has_distinct_names(params: &[Param]) -> bool {
    let mut seen = HashSet::new();
    params
        .iter()
        .all(|param| !param.name.is_empty() && seen.insert(param.name.as_str()))
}

fn sanitize_with(value: &DynSolValue, param: Option<&Param>) -> Value {
    match value {
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Address(addr) => Value::String(format!("0x{:x}", addr)),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f.as_slice()))),
        // Array elements share the declared element type, whose components
        // are the array param's own components.
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => Value::Array(
            items.iter().map(|item| sanitize_with(item, param)).collect(),
        ),
        DynSolValue::Tuple(items) => match param {
            Some(param) => sanitize_sequence(&param.components, items),
            None => Value::Array(items.iter().map(sanitize).collect()),
        },
        #[allow(unreachable_patterns)]
        other => sanitize_unlisted(other),
    }
}

/// Variants only present under optional alloy features. Sequence-like ones
/// keep their items; anything else has no JSON form and becomes null.
fn sanitize_unlisted(value: &DynSolValue) -> Value {
    match value.as_fixed_seq().or_else(|| value.as_tuple()) {
        Some(items) => Value::Array(items.iter().map(sanitize).collect()),
        None => Value::Null,
    }
}
