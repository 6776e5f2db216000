//! Contract manifest: the deploy-time declaration of a contract's ABI,
//! permissions, and supported NEP standards. Unlike the byte-exact wire
//! types elsewhere, the manifest is JSON on the wire (it's user-authored
//! and tooling-readable), so it rides on `serde_json` directly rather than
//! `neo_io::Serializable`.

use neo_core::UInt160;
use serde::{Deserialize, Serialize};

use crate::error::{ScError, ScResult};

/// Deploy-time cap on a manifest's serialized JSON length.
pub const MAX_MANIFEST_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethodDescriptor {
    pub name: String,
    pub parameters: Vec<ContractParameterDefinition>,
    #[serde(rename = "returntype")]
    pub return_type: String,
    pub offset: u32,
    pub safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEventDescriptor {
    pub name: String,
    pub parameters: Vec<ContractParameterDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractAbi {
    pub methods: Vec<ContractMethodDescriptor>,
    pub events: Vec<ContractEventDescriptor>,
}

impl ContractAbi {
    pub fn find_method(&self, name: &str, param_count: usize) -> Option<&ContractMethodDescriptor> {
        self.methods.iter().find(|m| m.name == name && m.parameters.len() == param_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    pub pubkey: String,
    pub signature: String,
}

/// `contract: "*"` means "any contract"; methods empty means "any method".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPermission {
    pub contract: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ContractPermission {
    pub fn allows(&self, hash: &UInt160, method: &str) -> bool {
        let contract_ok = self.contract == "*" || self.contract == hash.to_string();
        let method_ok = self.methods.is_empty() || self.methods.iter().any(|m| m == method);
        contract_ok && method_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<ContractGroup>,
    #[serde(rename = "supportedstandards", default)]
    pub supported_standards: Vec<String>,
    pub abi: ContractAbi,
    #[serde(default)]
    pub permissions: Vec<ContractPermission>,
    #[serde(default)]
    pub trusts: Vec<String>,
    #[serde(default = "default_extra")]
    pub extra: serde_json::Value,
}

fn default_extra() -> serde_json::Value {
    serde_json::Value::Null
}

impl ContractManifest {
    pub fn to_json(&self) -> ScResult<String> {
        serde_json::to_string(self).map_err(|e| ScError::InvalidManifest(e.to_string()))
    }

    pub fn from_json(json: &str) -> ScResult<Self> {
        let manifest: Self = serde_json::from_str(json).map_err(|e| ScError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Whether this manifest permits `caller` to invoke `method` on the
    /// contract it describes.
    pub fn can_call(&self, caller: &UInt160, method: &str) -> bool {
        self.permissions.iter().any(|p| p.allows(caller, method))
    }

    pub fn validate(&self) -> ScResult<()> {
        if self.name.is_empty() {
            return Err(ScError::InvalidManifest("contract name cannot be empty".to_string()));
        }
        let encoded = self.to_json()?;
        if encoded.len() > MAX_MANIFEST_LENGTH {
            return Err(ScError::InvalidManifest("manifest exceeds maximum length".to_string()));
        }
        for method in &self.abi.methods {
            if method.name.is_empty() {
                return Err(ScError::InvalidManifest("method name cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContractManifest {
        ContractManifest {
            name: "Sample".to_string(),
            groups: vec![],
            supported_standards: vec!["NEP-17".to_string()],
            abi: ContractAbi {
                methods: vec![ContractMethodDescriptor {
                    name: "transfer".to_string(),
                    parameters: vec![ContractParameterDefinition {
                        name: "to".to_string(),
                        parameter_type: "Hash160".to_string(),
                    }],
                    return_type: "Boolean".to_string(),
                    offset: 0,
                    safe: false,
                }],
                events: vec![],
            },
            permissions: vec![ContractPermission { contract: "*".to_string(), methods: vec![] }],
            trusts: vec![],
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let manifest = sample();
        let json = manifest.to_json().unwrap();
        let decoded = ContractManifest::from_json(&json).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn wildcard_permission_allows_any_caller_and_method() {
        let manifest = sample();
        assert!(manifest.can_call(&UInt160::ZERO, "anything"));
    }

    #[test]
    fn abi_lookup_matches_by_name_and_arity() {
        let manifest = sample();
        assert!(manifest.abi.find_method("transfer", 1).is_some());
        assert!(manifest.abi.find_method("transfer", 2).is_none());
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut manifest = sample();
        manifest.name = String::new();
        assert!(manifest.validate().is_err());
    }
}
