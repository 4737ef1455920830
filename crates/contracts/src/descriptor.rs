//! ABI and bytecode descriptors for the bundled contract artifacts.
//!
//! An artifact is the JSON interface description plus, for deployable
//! contracts, the hex creation bytecode. [`ContractInterface`] derives the
//! read-only views used for dispatch and compatibility checks: canonical
//! signatures, function and error selectors, and event topics.

use std::collections::BTreeSet;
use std::str::FromStr;

use ethers::abi::Abi;
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};

use river_common::{Error, Result};

/// A contract artifact embedded at build time
#[derive(Debug, Clone, Copy)]
pub struct ContractArtifact {
    /// Contract name as used by the generated binding
    pub name: &'static str,
    json: &'static str,
}

macro_rules! artifact {
    ($name:literal) => {
        ContractArtifact {
            name: $name,
            json: include_str!(concat!("../abi/", $name, ".json")),
        }
    };
}

/// Every bundled artifact
pub const ARTIFACTS: &[ContractArtifact] = &[
    artifact!("ICustomEntitlement"),
    artifact!("IEntitlement"),
    artifact!("IEntitlementGated"),
    artifact!("MockCustomEntitlement"),
    artifact!("MockEntitlementChecker"),
    artifact!("MockErc20"),
    artifact!("MockErc721"),
    artifact!("MockRiverRegistry"),
    artifact!("RuleEntitlement"),
    artifact!("RuleEntitlementV2"),
    artifact!("WalletLink"),
];

/// Find a bundled artifact by name, ignoring case
pub fn artifact(name: &str) -> Option<&'static ContractArtifact> {
    ARTIFACTS.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

impl ContractArtifact {
    /// Raw artifact JSON
    pub fn json(&self) -> &'static str {
        self.json
    }

    fn value(&self) -> Result<Value> {
        Ok(serde_json::from_str(self.json)?)
    }

    /// The `abi` array of the artifact
    pub fn abi_value(&self) -> Result<Value> {
        self.value()?
            .get("abi")
            .cloned()
            .ok_or_else(|| Error::decode(format!("artifact {} has no abi", self.name)))
    }

    /// ABI as understood by the encoder
    pub fn abi(&self) -> Result<Abi> {
        Ok(serde_json::from_value(self.abi_value()?)?)
    }

    /// Creation bytecode, `None` for interfaces and abstract contracts
    pub fn bytecode(&self) -> Result<Option<Bytes>> {
        match self.value()?.get("bytecode").and_then(|v| v.as_str()) {
            Some(hex) if hex != "0x" && !hex.is_empty() => Bytes::from_str(hex)
                .map(Some)
                .map_err(|e| Error::decode(format!("invalid bytecode for {}: {}", self.name, e))),
            _ => Ok(None),
        }
    }

    pub fn is_deployable(&self) -> bool {
        matches!(self.bytecode(), Ok(Some(_)))
    }

    /// Parsed interface with selectors and topics
    pub fn interface(&self) -> Result<ContractInterface> {
        InterfaceParser::new().parse_value(&self.abi_value()?)
    }
}

/// Parsed contract interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInterface {
    pub constructor: Option<FunctionDef>,
    pub functions: Vec<FunctionDef>,
    pub events: Vec<EventDef>,
    pub errors: Vec<ErrorDef>,
}

/// ABI function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub inputs: Vec<ParamDef>,
    pub outputs: Vec<ParamDef>,
    /// pure, view, nonpayable or payable
    pub state_mutability: String,
    /// Canonical signature, e.g. `getStream(bytes32)`
    pub signature: String,
    /// First four bytes of the signature hash, hex with prefix
    pub selector: String,
}

/// ABI event definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    pub inputs: Vec<ParamDef>,
    pub anonymous: bool,
    pub signature: String,
    /// topic0 of emitted logs
    pub topic: H256,
}

/// ABI custom error definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    pub inputs: Vec<ParamDef>,
    pub signature: String,
    pub selector: String,
}

/// ABI parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    /// Declared type, tuples keep the `tuple` spelling
    pub param_type: String,
    /// Solidity type name (for structs and enums)
    pub internal_type: Option<String>,
    pub components: Option<Vec<ParamDef>>,
    pub indexed: bool,
}

impl ParamDef {
    /// Canonical type used in signatures, with tuples expanded
    pub fn canonical_type(&self) -> String {
        match self.param_type.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> = self
                    .components
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(ParamDef::canonical_type)
                    .collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.param_type.clone(),
        }
    }
}

/// keccak-256 of arbitrary bytes
pub fn keccak(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn canonical_signature(name: &str, inputs: &[ParamDef]) -> String {
    let types: Vec<String> = inputs.iter().map(ParamDef::canonical_type).collect();
    format!("{}({})", name, types.join(","))
}

fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(&keccak(signature.as_bytes())[..4]))
}

/// Parser turning ABI JSON into a [`ContractInterface`]
#[derive(Debug, Default)]
pub struct InterfaceParser;

impl InterfaceParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse from JSON text, either a bare ABI array or an artifact object
    pub fn parse_content(&self, content: &str) -> Result<ContractInterface> {
        let value: Value = serde_json::from_str(content)?;
        self.parse_value(&value)
    }

    /// Parse a file holding a bare ABI array or an artifact object
    pub fn parse_file(&self, path: &std::path::Path) -> Result<ContractInterface> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    pub fn parse_value(&self, value: &Value) -> Result<ContractInterface> {
        let items = value
            .get("abi")
            .unwrap_or(value)
            .as_array()
            .ok_or_else(|| Error::decode("ABI must be an array"))?;

        let mut interface = ContractInterface {
            constructor: None,
            functions: Vec::new(),
            events: Vec::new(),
            errors: Vec::new(),
        };

        for item in items {
            match item.get("type").and_then(|v| v.as_str()).unwrap_or("function") {
                "constructor" => interface.constructor = Some(self.parse_function(item, "constructor")?),
                "function" => interface.functions.push(self.parse_function(item, "function")?),
                "event" => interface.events.push(self.parse_event(item)?),
                "error" => interface.errors.push(self.parse_error(item)?),
                // fallback and receive carry no signature
                _ => {}
            }
        }

        Ok(interface)
    }

    fn parse_function(&self, value: &Value, default_name: &str) -> Result<FunctionDef> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(default_name)
            .to_string();
        let inputs = Self::parse_list(value, "inputs")?;
        let outputs = Self::parse_list(value, "outputs")?;

        let state_mutability = value
            .get("stateMutability")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                if value.get("constant").and_then(|v| v.as_bool()).unwrap_or(false) {
                    "view"
                } else if value.get("payable").and_then(|v| v.as_bool()).unwrap_or(false) {
                    "payable"
                } else {
                    "nonpayable"
                }
            })
            .to_string();

        let signature = canonical_signature(&name, &inputs);
        let selector = selector_hex(&signature);

        Ok(FunctionDef {
            name,
            inputs,
            outputs,
            state_mutability,
            signature,
            selector,
        })
    }

    fn parse_event(&self, value: &Value) -> Result<EventDef> {
        let name = Self::required_name(value, "Event")?;
        let inputs = Self::parse_list(value, "inputs")?;
        let anonymous = value.get("anonymous").and_then(|v| v.as_bool()).unwrap_or(false);
        let signature = canonical_signature(&name, &inputs);
        let topic = H256::from(keccak(signature.as_bytes()));

        Ok(EventDef {
            name,
            inputs,
            anonymous,
            signature,
            topic,
        })
    }

    fn parse_error(&self, value: &Value) -> Result<ErrorDef> {
        let name = Self::required_name(value, "Error")?;
        let inputs = Self::parse_list(value, "inputs")?;
        let signature = canonical_signature(&name, &inputs);
        let selector = selector_hex(&signature);

        Ok(ErrorDef {
            name,
            inputs,
            signature,
            selector,
        })
    }

    fn required_name(value: &Value, kind: &str) -> Result<String> {
        value
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| Error::decode(format!("{} must have a name", kind)))
    }

    fn parse_list(value: &Value, key: &str) -> Result<Vec<ParamDef>> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| Self::parse_parameters(arr))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn parse_parameters(array: &[Value]) -> Result<Vec<ParamDef>> {
        array
            .iter()
            .map(|param| {
                let param_type = param
                    .get("type")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::decode("Parameter must have a type"))?
                    .to_string();

                let components = if param_type.starts_with("tuple") {
                    param
                        .get("components")
                        .and_then(|v| v.as_array())
                        .map(|arr| Self::parse_parameters(arr))
                        .transpose()?
                } else {
                    None
                };

                Ok(ParamDef {
                    name: param.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    param_type,
                    internal_type: param.get("internalType").and_then(|v| v.as_str()).map(String::from),
                    components,
                    indexed: param.get("indexed").and_then(|v| v.as_bool()).unwrap_or(false),
                })
            })
            .collect()
    }
}

impl ContractInterface {
    /// Read-only functions
    pub fn view_functions(&self) -> Vec<&FunctionDef> {
        self.functions
            .iter()
            .filter(|f| f.state_mutability == "view" || f.state_mutability == "pure")
            .collect()
    }

    /// State-changing functions
    pub fn transaction_functions(&self) -> Vec<&FunctionDef> {
        self.functions
            .iter()
            .filter(|f| f.state_mutability == "nonpayable" || f.state_mutability == "payable")
            .collect()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn event_by_topic(&self, topic: &H256) -> Option<&EventDef> {
        self.events.iter().find(|e| &e.topic == topic)
    }

    pub fn error_by_selector(&self, selector: &str) -> Option<&ErrorDef> {
        self.errors.iter().find(|e| e.selector.eq_ignore_ascii_case(selector))
    }

    /// Signatures this interface exposes that `deployed` lacks.
    ///
    /// Function and error signatures are compared by selector text, events
    /// by signature including which inputs are indexed, since indexing
    /// changes how logs decode without changing the topic.
    pub fn missing_from(&self, deployed: &ContractInterface) -> Vec<String> {
        let functions: BTreeSet<&str> = deployed.functions.iter().map(|f| f.signature.as_str()).collect();
        let errors: BTreeSet<&str> = deployed.errors.iter().map(|e| e.signature.as_str()).collect();
        let events: BTreeSet<String> = deployed.events.iter().map(indexed_event_signature).collect();

        let mut missing = Vec::new();
        for f in &self.functions {
            if !functions.contains(f.signature.as_str()) {
                missing.push(format!("function {}", f.signature));
            }
        }
        for e in &self.events {
            if !events.contains(&indexed_event_signature(e)) {
                missing.push(format!("event {}", indexed_event_signature(e)));
            }
        }
        for e in &self.errors {
            if !errors.contains(e.signature.as_str()) {
                missing.push(format!("error {}", e.signature));
            }
        }
        missing
    }
}

fn indexed_event_signature(event: &EventDef) -> String {
    let types: Vec<String> = event
        .inputs
        .iter()
        .map(|p| {
            if p.indexed {
                format!("{} indexed", p.canonical_type())
            } else {
                p.canonical_type()
            }
        })
        .collect();
    format!("{}({})", event.name, types.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_artifact_parses() {
        for artifact in ARTIFACTS {
            let interface = artifact.interface().unwrap();
            assert!(!interface.functions.is_empty(), "{} has no functions", artifact.name);
            artifact.abi().unwrap();
        }
    }

    #[test]
    fn test_bytecode_presence() {
        assert!(artifact("MockRiverRegistry").unwrap().is_deployable());
        assert!(artifact("walletlink").unwrap().is_deployable());
        assert!(!artifact("IEntitlementGated").unwrap().is_deployable());
        assert!(artifact("NoSuchContract").is_none());
    }

    #[test]
    fn test_selectors_match_encoder() {
        for artifact in ARTIFACTS {
            let abi = artifact.abi().unwrap();
            let interface = artifact.interface().unwrap();
            for f in &interface.functions {
                let expected = abi
                    .functions_by_name(&f.name)
                    .unwrap()
                    .iter()
                    .map(|func| format!("0x{}", hex::encode(func.short_signature())))
                    .collect::<Vec<_>>();
                assert!(expected.contains(&f.selector), "{}: {}", artifact.name, f.signature);
            }
            for e in &interface.events {
                let expected = abi.event(&e.name).unwrap().signature();
                assert_eq!(expected, e.topic, "{}: {}", artifact.name, e.signature);
            }
        }
    }

    #[test]
    fn test_tuple_signatures_are_expanded() {
        let interface = artifact("MockRiverRegistry").unwrap().interface().unwrap();
        let batch = interface.function("setStreamLastMiniblockBatch").unwrap();
        assert_eq!(
            batch.signature,
            "setStreamLastMiniblockBatch((bytes32,bytes32,bytes32,uint64,bool)[])"
        );

        let link = artifact("WalletLink").unwrap().interface().unwrap();
        let f = link.function("linkWalletToRootKey").unwrap();
        assert_eq!(
            f.signature,
            "linkWalletToRootKey((address,bytes,string),(address,bytes,string),uint256)"
        );
    }

    #[test]
    fn test_view_and_transaction_split() {
        let interface = artifact("MockCustomEntitlement").unwrap().interface().unwrap();
        let views: Vec<&str> = interface.view_functions().iter().map(|f| f.name.as_str()).collect();
        let txs: Vec<&str> = interface.transaction_functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(views, vec!["isEntitled"]);
        assert_eq!(txs, vec!["setEntitled"]);
        assert!(interface.constructor.is_some());
    }

    #[test]
    fn test_error_lookup_by_selector() {
        let interface = artifact("IEntitlementGated").unwrap().interface().unwrap();
        let def = interface
            .errors
            .iter()
            .find(|e| e.name == "EntitlementGated_NodeAlreadyVoted")
            .unwrap();
        let found = interface.error_by_selector(&def.selector.to_uppercase().replace("0X", "0x")).unwrap();
        assert_eq!(found.signature, "EntitlementGated_NodeAlreadyVoted()");
    }

    #[test]
    fn test_missing_from_detects_drift() {
        let full = artifact("RuleEntitlement").unwrap().interface().unwrap();
        let base = artifact("IEntitlement").unwrap().interface().unwrap();

        // Everything the base interface declares exists in the module
        assert!(base.missing_from(&full).is_empty());

        let missing = full.missing_from(&base);
        assert!(missing.iter().any(|m| m.starts_with("function getRuleData(")));
    }

    #[test]
    fn test_indexing_change_is_reported() {
        let a = InterfaceParser::new()
            .parse_content(r#"[{"type":"event","name":"Ping","inputs":[{"name":"who","type":"address","indexed":true}],"anonymous":false}]"#)
            .unwrap();
        let b = InterfaceParser::new()
            .parse_content(r#"{"abi":[{"type":"event","name":"Ping","inputs":[{"name":"who","type":"address","indexed":false}],"anonymous":false}]}"#)
            .unwrap();
        assert_eq!(a.events[0].topic, b.events[0].topic);
        assert_eq!(a.missing_from(&b), vec!["event Ping(address indexed)".to_string()]);
    }
}
