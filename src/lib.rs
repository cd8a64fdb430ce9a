pub mod abis;
pub mod address;
pub mod artifact;
pub mod chain;
pub mod config;
pub mod deployer;
pub mod forge_utils;
pub mod telemetry;
pub mod verify;

pub use self::address::{address_from_data, SINGLETON_FACTORY};
pub use self::artifact::ContractArtifact;
pub use self::chain::{ChainClient, MiddlewareChain, TxParams};
pub use self::config::Config;
pub use self::deployer::{DeployError, DeployedContract, Deployer};
pub use self::forge_utils::ContractSpec;
pub use self::verify::{
    validate_bytecode, CompilerVersionResolver, VerificationDispatcher,
    VerificationError, VerificationRequest,
};
