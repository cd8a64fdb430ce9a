use ethers::types::Address;
use ethers::utils::keccak256;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::ContractArtifact;
use crate::forge_utils::ContractSpec;

pub mod backends;
pub mod compiler_version;
pub mod dispatcher;
pub mod request;

pub use self::backends::{
    Backend, BackendError, EtherscanVerifier, HttpMinimalVerifier,
    MinimalVerifier, StandardJsonVerifier,
};
pub use self::compiler_version::{
    CompilerVersionLookupError, CompilerVersionResolver, CompilerVersions,
};
pub use self::dispatcher::{VerificationDispatcher, VerificationReport};
pub use self::request::{OptimizerSettings, VerificationRequest};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    VersionLookup(#[from] CompilerVersionLookupError),

    #[error(
        "creation bytecode of {name} does not match the expected bytecode \
         (local {local_len} bytes, keccak {local_hash}; expected \
         {expected_len} bytes, keccak {expected_hash}; first difference at \
         offset {first_difference})"
    )]
    BytecodeMismatch {
        name: String,
        local_len: usize,
        local_hash: String,
        expected_len: usize,
        expected_hash: String,
        first_difference: usize,
    },

    #[error(
        "{backend} verification of {contract} at {address:?} failed \
         (completed: {completed:?})"
    )]
    Submission {
        backend: Backend,
        contract: ContractSpec,
        address: Address,
        completed: Vec<Backend>,
        #[source]
        source: BackendError,
    },
}

/// Fails unless the artifact's creation bytecode is exactly `expected`.
pub fn validate_bytecode(
    artifact: &ContractArtifact,
    expected: impl AsRef<[u8]>,
) -> Result<(), VerificationError> {
    let local = artifact.bytecode.as_ref();
    let expected = expected.as_ref();

    if local == expected {
        info!("Bytecode of {} matches", artifact.name);
        return Ok(());
    }

    // A strict prefix differs at the shorter length
    let first_difference = local
        .iter()
        .zip(expected)
        .position(|(local, expected)| local != expected)
        .unwrap_or_else(|| local.len().min(expected.len()));

    warn!(
        "Bytecode of {} differs at offset {first_difference}",
        artifact.name
    );

    Err(VerificationError::BytecodeMismatch {
        name: artifact.name.clone(),
        local_len: local.len(),
        local_hash: hex::encode(keccak256(local)),
        expected_len: expected.len(),
        expected_hash: hex::encode(keccak256(expected)),
        first_difference,
    })
}
