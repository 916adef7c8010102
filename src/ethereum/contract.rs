use alloy::{
    dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier, Word},
    json_abi::Function,
    primitives::{Address, Bytes, Sign, I256, U256},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::provider::ChainClient;
use super::resolver::ResolvedFunction;
use crate::error::RelayError;
use crate::ethereum::utils;

/// Executes resolved functions against the chain
pub struct ContractInvoker {
    chain: Arc<dyn ChainClient>,
}

impl ContractInvoker {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Call `resolved` on `address` with caller-supplied `params` and return
    /// the decoded outputs. State-changing functions are refused: they must
    /// be signed by the caller's own wallet.
    pub async fn invoke(
        &self,
        address: Address,
        resolved: &ResolvedFunction,
        params: &Value,
    ) -> Result<Vec<DynSolValue>, RelayError> {
        let function = match resolved {
            ResolvedFunction::Read(function) => function,
            ResolvedFunction::Write(function) => {
                return Err(RelayError::StateChangingCall(function.signature()));
            }
        };

        let calldata = encode_function_call(function, params)?;

        info!("Calling {} on {:?}", function.signature(), address);
        let result_bytes = self.chain.call(address, calldata).await?;

        decode_function_result(function, &result_bytes, address)
    }
}

/// Validate `parameters` against the function's declared inputs and encode
/// the calldata. Accepts a positional array or an object keyed by parameter
/// name.
pub fn encode_function_call(function: &Function, parameters: &Value) -> Result<Bytes, RelayError> {
    let expected_params = || -> String {
        function
            .inputs
            .iter()
            .map(|input| format!("{} {}", input.ty, input.name).trim_end().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let values: Vec<&Value> = match parameters {
        Value::Array(params) => {
            if params.len() != function.inputs.len() {
                return Err(RelayError::ArgumentMismatch(format!(
                    "Parameter count mismatch for function '{}': expected {} parameters, got {}. Expected parameters: [{}]",
                    function.name,
                    function.inputs.len(),
                    params.len(),
                    expected_params()
                )));
            }
            params.iter().collect()
        }
        Value::Object(obj) => function
            .inputs
            .iter()
            .map(|input| {
                obj.get(&input.name).ok_or_else(|| {
                    RelayError::ArgumentMismatch(format!(
                        "Missing required parameter '{}' of type '{}' for function '{}'. Expected parameters: [{}]",
                        input.name,
                        input.ty,
                        function.name,
                        expected_params()
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        Value::Null if function.inputs.is_empty() => Vec::new(),
        other => {
            return Err(RelayError::ArgumentMismatch(format!(
                "Invalid parameter format for function '{}': expected an array of arguments, got {}",
                function.name, other
            )));
        }
    };

    let mut dyn_values = Vec::with_capacity(values.len());
    for (i, (value, input)) in values.into_iter().zip(&function.inputs).enumerate() {
        let mismatch = |reason: String| {
            RelayError::ArgumentMismatch(format!(
                "Invalid parameter #{} ('{}' of type '{}'): {}",
                i + 1,
                input.name,
                input.ty,
                reason
            ))
        };
        let ty = input.resolve().map_err(|e| mismatch(e.to_string()))?;
        dyn_values.push(json_to_dyn_sol_value(value, &ty).map_err(mismatch)?);
    }

    let encoded = function
        .abi_encode_input(&dyn_values)
        .map_err(|e| RelayError::ArgumentMismatch(format!("Failed to encode function inputs: {}", e)))?;

    Ok(encoded.into())
}

fn decode_function_result(
    function: &Function,
    result_bytes: &Bytes,
    address: Address,
) -> Result<Vec<DynSolValue>, RelayError> {
    if function.outputs.is_empty() {
        return Ok(Vec::new());
    }

    if result_bytes.is_empty() {
        return Err(RelayError::ExecutionError(format!(
            "Call to {} returned no data. Is a contract deployed at {:?}?",
            function.name, address
        )));
    }

    let decoded = function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| RelayError::ExecutionError(format!("Failed to decode result: {}", e)))?;
    debug!("Decoded {} output value(s) from {}", decoded.len(), function.name);

    Ok(decoded)
}

/// Convert a JSON argument to a value of the declared Solidity type
fn json_to_dyn_sol_value(value: &Value, sol_type: &DynSolType) -> Result<DynSolValue, String> {
    match sol_type {
        DynSolType::Address => {
            let addr_str = value.as_str().ok_or("Address must be a string")?;
            let address = utils::validate_address(addr_str).map_err(|e| e.to_string())?;
            Ok(DynSolValue::Address(address))
        }
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(DynSolValue::Bool(s == "true")),
            _ => Err("Bool parameter must be a boolean".into()),
        },
        DynSolType::String => {
            let s = value.as_str().ok_or("String parameter must be a string")?;
            Ok(DynSolValue::String(s.to_string()))
        }
        DynSolType::Uint(bits) => {
            let num = match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(U256::from)
                    .ok_or_else(|| format!("Invalid uint value: {}", n))?,
                Value::String(s) => {
                    utils::parse_u256(s).ok_or_else(|| format!("Invalid uint string: {}", s))?
                }
                _ => return Err("Uint must be a number or string".into()),
            };
            if *bits < 256 && num >> *bits != U256::ZERO {
                return Err(format!("Value {} does not fit in uint{}", num, bits));
            }
            Ok(DynSolValue::Uint(num, *bits))
        }
        DynSolType::Int(bits) => {
            let text = match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                _ => return Err("Int must be an integer or decimal/hex string".into()),
            };
            let (sign, digits) = match text.strip_prefix('-') {
                Some(rest) => (Sign::Negative, rest),
                None => (Sign::Positive, text.strip_prefix('+').unwrap_or(&text)),
            };
            let magnitude = utils::parse_u256(digits)
                .ok_or_else(|| format!("Invalid int value: {}", text))?;
            let limit = U256::from(1u8) << (*bits - 1);
            let fits = match sign {
                Sign::Negative => magnitude <= limit,
                Sign::Positive => magnitude < limit,
            };
            if !fits {
                return Err(format!("Value {} does not fit in int{}", text, bits));
            }
            let num = I256::checked_from_sign_and_abs(sign, magnitude)
                .ok_or_else(|| format!("Value {} does not fit in int{}", text, bits))?;
            Ok(DynSolValue::Int(num, *bits))
        }
        DynSolType::FixedBytes(size) => {
            let bytes = decode_hex(value)?;
            if bytes.len() != *size {
                return Err(format!(
                    "Expected {} bytes for bytes{}, got {}",
                    size,
                    size,
                    bytes.len()
                ));
            }
            let mut word_bytes = [0u8; 32];
            word_bytes[..*size].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(Word::from(word_bytes), *size))
        }
        DynSolType::Bytes => Ok(DynSolValue::Bytes(decode_hex(value)?)),
        DynSolType::Function => {
            let bytes = decode_hex(value)?;
            if bytes.len() != 24 {
                return Err(format!("Function reference must be 24 bytes, got {}", bytes.len()));
            }
            Ok(DynSolValue::Function(alloy::primitives::Function::from_slice(&bytes)))
        }
        DynSolType::Array(element_type) => {
            let array = value.as_array().ok_or("Array parameter must be an array")?;
            let items = array
                .iter()
                .map(|element| json_to_dyn_sol_value(element, element_type))
                .collect::<Result<_, _>>()?;
            Ok(DynSolValue::Array(items))
        }
        DynSolType::FixedArray(element_type, len) => {
            let array = value.as_array().ok_or("Array parameter must be an array")?;
            if array.len() != *len {
                return Err(format!("Expected {} elements, got {}", len, array.len()));
            }
            let items = array
                .iter()
                .map(|element| json_to_dyn_sol_value(element, element_type))
                .collect::<Result<_, _>>()?;
            Ok(DynSolValue::FixedArray(items))
        }
        DynSolType::Tuple(types) => {
            let array = value
                .as_array()
                .ok_or("Tuple parameter must be an array of its components")?;
            if array.len() != types.len() {
                return Err(format!(
                    "Expected {} tuple components, got {}",
                    types.len(),
                    array.len()
                ));
            }
            let items = array
                .iter()
                .zip(types)
                .map(|(element, ty)| json_to_dyn_sol_value(element, ty))
                .collect::<Result<_, _>>()?;
            Ok(DynSolValue::Tuple(items))
        }
        #[allow(unreachable_patterns)]
        other => Err(format!("Unsupported Solidity type: {}", other)),
    }
}

fn decode_hex(value: &Value) -> Result<Vec<u8>, String> {
    let hex_str = value.as_str().ok_or("Bytes must be a hex string")?;
    hex::decode(hex_str.trim_start_matches("0x")).map_err(|_| format!("Invalid hex string: {}", hex_str))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ethereum::resolver::resolve;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Chain double that records calldata and replays a canned response
    pub struct FakeChain {
        pub response: Result<Bytes, RelayError>,
        pub calls: Mutex<Vec<(Address, Bytes)>>,
    }

    impl FakeChain {
        pub fn returning(response: Result<Bytes, RelayError>) -> Self {
            Self {
                response,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, RelayError> {
            self.calls.lock().unwrap().push((to, calldata));
            self.response.clone()
        }
    }

    fn abi() -> Value {
        json!([
            {
                "type": "function", "name": "balanceOf", "stateMutability": "view",
                "inputs": [{ "name": "owner", "type": "address" }],
                "outputs": [{ "name": "", "type": "uint256" }]
            },
            {
                "type": "function", "name": "transfer", "stateMutability": "nonpayable",
                "inputs": [{ "name": "to", "type": "address" }, { "name": "amount", "type": "uint256" }],
                "outputs": [{ "name": "", "type": "bool" }]
            },
            {
                "type": "function", "name": "mixed", "stateMutability": "pure",
                "inputs": [
                    { "name": "small", "type": "uint8" },
                    { "name": "signed", "type": "int16" },
                    { "name": "tag", "type": "bytes4" },
                    { "name": "ids", "type": "uint256[2]" },
                    { "name": "pair", "type": "tuple", "components": [
                        { "name": "flag", "type": "bool" },
                        { "name": "label", "type": "string" }
                    ]}
                ],
                "outputs": []
            }
        ])
    }

    const OWNER: &str = "0x000000000000000000000000000000000000dEaD";

    fn balance_bytes(value: &str) -> Bytes {
        let balance = U256::from_str_radix(value, 10).unwrap();
        DynSolValue::Uint(balance, 256).abi_encode().into()
    }

    #[tokio::test]
    async fn test_read_call_decodes_output() {
        let chain = Arc::new(FakeChain::returning(Ok(balance_bytes(
            "123456789012345678901234",
        ))));
        let invoker = ContractInvoker::new(chain.clone());
        let resolved = resolve(&abi(), "balanceOf").unwrap();
        let contract = Address::repeat_byte(0xab);

        let outputs = invoker
            .invoke(contract, &resolved, &json!([OWNER]))
            .await
            .unwrap();

        assert_eq!(
            outputs,
            vec![DynSolValue::Uint(
                U256::from_str_radix("123456789012345678901234", 10).unwrap(),
                256
            )]
        );

        let calls = chain.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, contract);
        assert_eq!(&calls[0].1[..4], resolved.function().selector().as_slice());
    }

    #[tokio::test]
    async fn test_write_call_refused_without_touching_chain() {
        let chain = Arc::new(FakeChain::returning(Ok(Bytes::new())));
        let invoker = ContractInvoker::new(chain.clone());
        let resolved = resolve(&abi(), "transfer").unwrap();

        let err = invoker
            .invoke(Address::ZERO, &resolved, &json!([OWNER, "1"]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RelayError::StateChangingCall("transfer(address,uint256)".into())
        );
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_argument_mismatch_precedes_execution() {
        let chain = Arc::new(FakeChain::returning(Ok(balance_bytes("1"))));
        let invoker = ContractInvoker::new(chain.clone());
        let resolved = resolve(&abi(), "balanceOf").unwrap();

        let err = invoker
            .invoke(Address::ZERO, &resolved, &json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ArgumentMismatch(_)));

        let err = invoker
            .invoke(Address::ZERO, &resolved, &json!([42]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'owner' of type 'address'"));
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_return_data_is_execution_error() {
        let chain = Arc::new(FakeChain::returning(Ok(Bytes::new())));
        let invoker = ContractInvoker::new(chain);
        let resolved = resolve(&abi(), "balanceOf").unwrap();

        let err = invoker
            .invoke(Address::ZERO, &resolved, &json!([OWNER]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_chain_errors_pass_through() {
        let chain = Arc::new(FakeChain::returning(Err(RelayError::ExecutionError(
            "execution reverted".into(),
        ))));
        let invoker = ContractInvoker::new(chain);
        let resolved = resolve(&abi(), "balanceOf").unwrap();

        let err = invoker
            .invoke(Address::ZERO, &resolved, &json!([OWNER]))
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::ExecutionError("execution reverted".into()));
    }

    #[test]
    fn test_encode_mixed_types() {
        let resolved = resolve(&abi(), "mixed").unwrap();
        let function = resolved.function();

        let ok = encode_function_call(
            function,
            &json!([255, "-32768", "0xdeadbeef", ["1", "0x02"], [true, "hi"]]),
        );
        assert!(ok.is_ok());

        let named = encode_function_call(
            function,
            &json!({
                "small": "7", "signed": -1, "tag": "0x01020304",
                "ids": [1, 2], "pair": [false, ""]
            }),
        );
        assert!(named.is_ok());

        for signed in [json!("0x10"), json!("-0x8000"), json!("0x7fff"), json!("+12")] {
            let params = json!([1, signed, "0x01020304", [1, 2], [true, ""]]);
            assert!(
                encode_function_call(function, &params).is_ok(),
                "expected {} to encode",
                params
            );
        }
    }

    #[test]
    fn test_hex_int_matches_decimal_encoding() {
        let resolved = resolve(&abi(), "mixed").unwrap();
        let function = resolved.function();
        let with = |signed: Value| {
            encode_function_call(function, &json!([0, signed, "0x00000000", [0, 0], [false, ""]]))
                .unwrap()
        };

        assert_eq!(with(json!("0x10")), with(json!(16)));
        assert_eq!(with(json!("-0x10")), with(json!("-16")));
    }

    #[test]
    fn test_encode_rejects_out_of_range_and_bad_shapes() {
        let resolved = resolve(&abi(), "mixed").unwrap();
        let function = resolved.function();
        let base = |small: Value, signed: Value, tag: Value, ids: Value| {
            json!([small, signed, tag, ids, [true, "x"]])
        };

        for params in [
            base(json!(256), json!(0), json!("0x01020304"), json!([1, 2])),
            base(json!(-1), json!(0), json!("0x01020304"), json!([1, 2])),
            base(json!(1), json!(32768), json!("0x01020304"), json!([1, 2])),
            base(json!(1), json!("0x8000"), json!("0x01020304"), json!([1, 2])),
            base(json!(1), json!("-0x8001"), json!("0x01020304"), json!([1, 2])),
            base(json!(1), json!(0), json!("0x0102"), json!([1, 2])),
            base(json!(1), json!(0), json!("0x01020304"), json!([1])),
            json!("not an array"),
        ] {
            assert!(
                matches!(
                    encode_function_call(function, &params),
                    Err(RelayError::ArgumentMismatch(_))
                ),
                "expected mismatch for {}",
                params
            );
        }
    }
}
