use std::path::Path;

use ethers::abi::{Abi, Tokenize};
use ethers::types::Bytes;
use eyre::Context;
use serde::Deserialize;

use crate::deployer::DeployError;
use crate::forge_utils::{ContractSpec, ForgeInspect};

/// A compiled contract: everything needed to build its creation
/// transaction.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct ForgeArtifact {
    abi: Abi,
    bytecode: ForgeBytecode,
}

#[derive(Deserialize)]
struct ForgeBytecode {
    object: Bytes,
}

impl ContractArtifact {
    pub fn new(name: impl ToString, abi: Abi, bytecode: Bytes) -> Self {
        Self {
            name: name.to_string(),
            abi,
            bytecode,
        }
    }

    /// Reads a forge build artifact, e.g. `out/Counter.sol/Counter.json`.
    pub async fn from_forge_artifact(
        name: impl ToString,
        path: impl AsRef<Path>,
    ) -> eyre::Result<Self> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading from {}", path.display()))?;

        let artifact: ForgeArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Parsing {}", path.display()))?;

        Ok(Self::new(name, artifact.abi, artifact.bytecode.object))
    }

    /// Compiles and inspects `contract_spec` with forge inside `cwd`.
    pub async fn from_forge(
        contract_spec: ContractSpec,
        cwd: impl AsRef<Path>,
    ) -> eyre::Result<Self> {
        let name = contract_spec.name.clone();
        let inspect = ForgeInspect::new(contract_spec).with_cwd(cwd);

        let abi = inspect.abi().await?;
        let bytecode = inspect.bytecode().await?;

        Ok(Self::new(name, abi, bytecode))
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_data(
        &self,
        args: impl Tokenize,
    ) -> Result<Bytes, DeployError> {
        if self.bytecode.is_empty() {
            return Err(self.encoding_error("no creation bytecode"));
        }

        let tokens = args.into_tokens();

        match self.abi.constructor() {
            None if !tokens.is_empty() => Err(self.encoding_error(
                "constructor arguments given but the ABI has no constructor",
            )),
            None => Ok(self.bytecode.clone()),
            Some(constructor) => constructor
                .encode_input(self.bytecode.to_vec(), &tokens)
                .map(Bytes::from)
                .map_err(|err| self.encoding_error(err)),
        }
    }

    fn encoding_error(&self, reason: impl ToString) -> DeployError {
        DeployError::Encoding {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use ethers::types::{Address, U256};
    use hex_literal::hex;

    use super::*;

    pub(crate) const COUNTER_BYTECODE: [u8; 14] =
        hex!("6080604052348015600f57600080");

    fn empty_abi() -> Abi {
        serde_json::from_str("[]").unwrap()
    }

    pub(crate) fn counter_artifact() -> ContractArtifact {
        let abi: Abi = serde_json::from_str(
            r#"[
                {
                    "type": "constructor",
                    "inputs": [
                        { "name": "owner", "type": "address" },
                        { "name": "start", "type": "uint256" }
                    ],
                    "stateMutability": "nonpayable"
                },
                {
                    "type": "function",
                    "name": "number",
                    "inputs": [],
                    "outputs": [{ "name": "", "type": "uint256" }],
                    "stateMutability": "view"
                }
            ]"#,
        )
        .unwrap();

        ContractArtifact::new("Counter", abi, COUNTER_BYTECODE.to_vec().into())
    }

    #[test]
    fn appends_constructor_args() {
        let artifact = counter_artifact();
        let owner = Address::repeat_byte(0x11);

        let data = artifact.creation_data((owner, U256::from(7))).unwrap();

        assert_eq!(data.len(), COUNTER_BYTECODE.len() + 64);
        assert_eq!(&data[..COUNTER_BYTECODE.len()], &COUNTER_BYTECODE);
        assert_eq!(
            &data[COUNTER_BYTECODE.len() + 12..][..20],
            owner.as_bytes()
        );
        assert_eq!(data.last(), Some(&7));
    }

    #[test]
    fn rejects_wrong_constructor_args() {
        let artifact = counter_artifact();

        let err = artifact.creation_data(U256::from(7)).unwrap_err();

        assert!(matches!(
            err,
            DeployError::Encoding { name, .. } if name == "Counter"
        ));
    }

    #[test]
    fn no_constructor() {
        let bytecode = Bytes::from(COUNTER_BYTECODE.to_vec());
        let artifact =
            ContractArtifact::new("Plain", empty_abi(), bytecode.clone());

        assert_eq!(artifact.creation_data(()).unwrap(), bytecode);
        assert!(matches!(
            artifact.creation_data(U256::one()),
            Err(DeployError::Encoding { .. })
        ));
    }

    #[test]
    fn interface_has_no_creation_bytecode() {
        let artifact =
            ContractArtifact::new("ICounter", empty_abi(), Bytes::default());

        assert!(matches!(
            artifact.creation_data(()),
            Err(DeployError::Encoding { name, .. }) if name == "ICounter"
        ));
    }

    #[tokio::test]
    async fn reads_forge_artifact() -> eyre::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;

        write!(
            file,
            r#"{{
                "abi": [],
                "bytecode": {{ "object": "0x{}", "linkReferences": {{}} }},
                "deployedBytecode": {{ "object": "0x" }}
            }}"#,
            hex::encode(COUNTER_BYTECODE)
        )?;

        let artifact =
            ContractArtifact::from_forge_artifact("Counter", file.path())
                .await?;

        assert_eq!(artifact.name, "Counter");
        assert_eq!(artifact.bytecode, Bytes::from(COUNTER_BYTECODE.to_vec()));
        assert!(artifact.abi.constructor().is_none());

        Ok(())
    }
}
