//! Decoding of EVM revert payloads.
//!
//! Revert data is either a custom Solidity error (selector plus ABI encoded
//! arguments), `Error(string)` or `Panic(uint256)`.

use std::collections::HashMap;
use std::fmt;

use ethers::abi::{Abi, ParamType, Token};
use ethers::types::{I256, U256};
use ethers::utils::id;

use river_common::{Error, Result};

use crate::descriptor::ARTIFACTS;

/// Selector of `Error(string)`
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of `Panic(uint256)`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

#[derive(Debug, Clone)]
struct ErrorShape {
    name: String,
    signature: String,
    inputs: Vec<ParamType>,
}

/// Decoded custom error
#[derive(Debug, Clone, PartialEq)]
pub struct CustomError {
    pub name: String,
    pub signature: String,
    pub params: Vec<Token>,
}

/// A decoded revert
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvmError {
    Custom(CustomError),
    /// `require(cond, "message")` style revert
    Message(String),
    /// Compiler inserted panic with its code
    Panic(U256),
}

impl DecodedEvmError {
    /// Error name, `Error` for string reverts and `Panic` for panics
    pub fn name(&self) -> &str {
        match self {
            DecodedEvmError::Custom(e) => &e.name,
            DecodedEvmError::Message(_) => "Error",
            DecodedEvmError::Panic(_) => "Panic",
        }
    }

    pub fn is_custom(&self, name: &str) -> bool {
        matches!(self, DecodedEvmError::Custom(e) if e.name == name)
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(format_token).collect();
        write!(f, "{}({})", self.name, params.join(","))
    }
}

impl fmt::Display for DecodedEvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedEvmError::Custom(e) => write!(f, "{}", e),
            DecodedEvmError::Message(msg) => write!(f, "{}", msg),
            DecodedEvmError::Panic(code) => write!(f, "Panic(0x{:x})", code),
        }
    }
}

fn format_token(token: &Token) -> String {
    match token {
        Token::Uint(v) => v.to_string(),
        Token::Int(v) => I256::from_raw(*v).to_string(),
        Token::Address(a) => format!("{:?}", a),
        Token::Bool(b) => b.to_string(),
        Token::String(s) => s.clone(),
        Token::Bytes(b) | Token::FixedBytes(b) => format!("0x{}", hex::encode(b)),
        Token::Array(items) | Token::FixedArray(items) => {
            let inner: Vec<String> = items.iter().map(format_token).collect();
            format!("[{}]", inner.join(","))
        }
        Token::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(format_token).collect();
            format!("({})", inner.join(","))
        }
    }
}

/// Decoder for revert data, indexed by custom error selector
#[derive(Debug, Clone, Default)]
pub struct EvmErrorDecoder {
    errors: HashMap<[u8; 4], ErrorShape>,
}

impl EvmErrorDecoder {
    /// Build from the custom errors declared in `abis`
    pub fn new<'a>(abis: impl IntoIterator<Item = &'a Abi>) -> Self {
        let mut errors = HashMap::new();
        for abi in abis {
            for error in abi.errors() {
                let inputs: Vec<ParamType> = error.inputs.iter().map(|p| p.kind.clone()).collect();
                let types: Vec<String> = inputs.iter().map(|t| t.to_string()).collect();
                let signature = format!("{}({})", error.name, types.join(","));
                errors.entry(id(&signature)).or_insert(ErrorShape {
                    name: error.name.clone(),
                    signature,
                    inputs,
                });
            }
        }
        Self { errors }
    }

    /// Decoder covering every bundled contract
    pub fn with_bundled_errors() -> Result<Self> {
        let abis = ARTIFACTS.iter().map(|a| a.abi()).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(abis.iter()))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Decode raw revert data
    pub fn decode(&self, data: &[u8]) -> Result<DecodedEvmError> {
        if data.len() < 4 {
            return Err(Error::decode(format!(
                "revert data too short: 0x{}",
                hex::encode(data)
            )));
        }
        let (selector, body) = data.split_at(4);
        let selector: [u8; 4] = [selector[0], selector[1], selector[2], selector[3]];

        if selector == ERROR_STRING_SELECTOR {
            let tokens = ethers::abi::decode(&[ParamType::String], body)?;
            return match tokens.into_iter().next() {
                Some(Token::String(msg)) => Ok(DecodedEvmError::Message(msg)),
                _ => Err(Error::decode("malformed Error(string) payload")),
            };
        }

        if selector == PANIC_SELECTOR {
            let tokens = ethers::abi::decode(&[ParamType::Uint(256)], body)?;
            return match tokens.into_iter().next() {
                Some(Token::Uint(code)) => Ok(DecodedEvmError::Panic(code)),
                _ => Err(Error::decode("malformed Panic(uint256) payload")),
            };
        }

        let shape = self
            .errors
            .get(&selector)
            .ok_or_else(|| Error::decode(format!("unknown error selector 0x{}", hex::encode(selector))))?;
        let params = ethers::abi::decode(&shape.inputs, body)
            .map_err(|e| Error::decode(format!("failed to decode {}: {}", shape.signature, e)))?;

        Ok(DecodedEvmError::Custom(CustomError {
            name: shape.name.clone(),
            signature: shape.signature.clone(),
            params,
        }))
    }

    /// Decode the revert data carried by `err`
    pub fn decode_error(&self, err: &Error) -> Result<DecodedEvmError> {
        match err.revert_data() {
            Some(data) => self.decode(data),
            None => Err(Error::decode(format!("error carries no revert data: {}", err))),
        }
    }

    /// Replace a revert with its decoded form when possible
    pub fn explain(&self, err: Error) -> Error {
        match self.decode_error(&err) {
            Ok(decoded) => Error::contract(format!("execution reverted: {}", decoded)),
            Err(_) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::AbiEncode;
    use ethers::types::Bytes;

    fn invalid_block_abi() -> Abi {
        serde_json::from_str(
            r#"[{"type":"error","name":"InvalidBlockNumber","inputs":[{"name":"","type":"uint256","internalType":"uint256"}]}]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_custom_error() {
        let abi = invalid_block_abi();
        let decoder = EvmErrorDecoder::new([&abi]);
        let data = hex::decode("9f4aafbe00000000000000000000000000000000000000000000000000000000006b4a50").unwrap();

        let decoded = decoder.decode(&data).unwrap();
        match &decoded {
            DecodedEvmError::Custom(e) => {
                assert_eq!(e.signature, "InvalidBlockNumber(uint256)");
                assert_eq!(e.params, vec![Token::Uint(U256::from(7031376u64))]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(decoded.to_string(), "InvalidBlockNumber(7031376)");
        assert!(decoded.is_custom("InvalidBlockNumber"));
    }

    #[test]
    fn test_string_error() {
        let decoder = EvmErrorDecoder::default();
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(ethers::abi::encode(&[Token::String("InvalidBlockNumber".to_string())]));

        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded, DecodedEvmError::Message("InvalidBlockNumber".to_string()));
        assert_eq!(decoded.to_string(), "InvalidBlockNumber");
    }

    #[test]
    fn test_panic() {
        let decoder = EvmErrorDecoder::default();
        let mut data = PANIC_SELECTOR.to_vec();
        data.extend(U256::from(0x11).encode());
        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.to_string(), "Panic(0x11)");
        assert_eq!(decoded.name(), "Panic");
    }

    #[test]
    fn test_unknown_and_short_data() {
        let decoder = EvmErrorDecoder::default();
        assert!(decoder.decode(&[0x01, 0x02]).is_err());
        assert!(decoder.decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }

    #[test]
    fn test_bundled_errors_include_gated_errors() {
        let decoder = EvmErrorDecoder::with_bundled_errors().unwrap();
        assert!(!decoder.is_empty());

        let data = id("EntitlementGated_NodeAlreadyVoted()").to_vec();
        let decoded = decoder.decode(&data).unwrap();
        assert!(decoded.is_custom("EntitlementGated_NodeAlreadyVoted"));
        assert_eq!(decoded.to_string(), "EntitlementGated_NodeAlreadyVoted()");
    }

    #[test]
    fn test_address_params_and_decode_error() {
        let decoder = EvmErrorDecoder::with_bundled_errors().unwrap();
        let owner = ethers::types::Address::repeat_byte(0xab);
        let mut data = id("Ownable__NotOwner(address)").to_vec();
        data.extend(ethers::abi::encode(&[Token::Address(owner)]));

        let err = Error::Revert(Bytes::from(data));
        let decoded = decoder.decode_error(&err).unwrap();
        assert_eq!(decoded.to_string(), format!("Ownable__NotOwner({:?})", owner));

        let explained = decoder.explain(err);
        assert!(explained.to_string().contains("Ownable__NotOwner"));

        assert!(decoder.decode_error(&Error::generic("no data")).is_err());
    }
}
