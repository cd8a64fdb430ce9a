use std::collections::BTreeMap;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::compiler_version::CompilerVersions;
use crate::forge_utils::ContractSpec;

pub const SOLIDITY: &str = "Solidity";

/// Per-contract outputs requested in the compiler input document
pub const CONTRACT_OUTPUT_SELECTION: [&str; 5] = [
    "abi",
    "evm.bytecode",
    "evm.deployedBytecode",
    "evm.methodIdentifiers",
    "metadata",
];

/// Per-file outputs requested in the compiler input document
pub const FILE_OUTPUT_SELECTION: [&str; 1] = ["ast"];

/// Source file path -> library name -> address
pub type Libraries = BTreeMap<String, BTreeMap<String, Address>>;

/// Everything the caller knows about a deployed contract's source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub contract: ContractSpec,
    /// Short (`v0.8.18`) or long (`v0.8.18+commit.87f61d96`)
    pub compiler_version: String,
    /// Source file path -> source text
    pub sources: BTreeMap<String, String>,
    pub optimizer: OptimizerSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Libraries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remappings: Option<Vec<String>>,
    #[serde(default)]
    pub wait_for_success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: 200,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Shape accepted by the minimal backend, which infers everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalVerificationRequest {
    pub network: String,
    pub address: Address,
    pub contract_name: ContractSpec,
    pub compiler_version: String,
    pub sources: BTreeMap<String, SourceFile>,
    pub optimizer: OptimizerSettings,
    pub visibility: Visibility,
}

/// Shape accepted by standard-JSON backends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardJsonVerificationRequest {
    pub network: String,
    pub address: Address,
    pub contract_name: ContractSpec,
    pub compiler_version: String,
    pub input: CompilerInput,
    pub wait_for_success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub content: String,
}

/// A solc standard JSON input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceFile>,
    pub settings: CompilerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    pub optimizer: OptimizerSettings,
    pub output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub remappings: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libraries: Libraries,
}

fn source_files(
    sources: &BTreeMap<String, String>,
) -> BTreeMap<String, SourceFile> {
    sources
        .iter()
        .map(|(path, content)| {
            (
                path.clone(),
                SourceFile {
                    content: content.clone(),
                },
            )
        })
        .collect()
}

fn output_selection() -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    let to_vec = |outputs: &[&str]| -> Vec<String> {
        outputs.iter().map(|output| output.to_string()).collect()
    };

    let per_file = BTreeMap::from([
        ("*".to_string(), to_vec(&CONTRACT_OUTPUT_SELECTION)),
        (String::new(), to_vec(&FILE_OUTPUT_SELECTION)),
    ]);

    BTreeMap::from([("*".to_string(), per_file)])
}

/// Projects `request` into the minimal backend's shape.
pub fn minimal_request(
    network: &str,
    address: Address,
    request: &VerificationRequest,
    versions: &CompilerVersions,
) -> MinimalVerificationRequest {
    MinimalVerificationRequest {
        network: network.to_string(),
        address,
        contract_name: request.contract.clone(),
        compiler_version: versions.short.clone(),
        sources: source_files(&request.sources),
        optimizer: request.optimizer,
        visibility: Visibility::Public,
    }
}

/// Projects `request` into a standard JSON input submission.
pub fn standard_json_request(
    network: &str,
    address: Address,
    request: &VerificationRequest,
    versions: &CompilerVersions,
) -> StandardJsonVerificationRequest {
    let input = CompilerInput {
        language: SOLIDITY.to_string(),
        sources: source_files(&request.sources),
        settings: CompilerSettings {
            optimizer: request.optimizer,
            output_selection: output_selection(),
            remappings: request.remappings.clone().unwrap_or_default(),
            libraries: request.libraries.clone().unwrap_or_default(),
        },
    };

    StandardJsonVerificationRequest {
        network: network.to_string(),
        address,
        contract_name: request.contract.clone(),
        compiler_version: versions.long.clone(),
        input,
        wait_for_success: request.wait_for_success,
    }
}
