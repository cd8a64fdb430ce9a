use ethers::types::{Address, H160};
use ethers::utils::keccak256;
use hex_literal::hex;

/// The EIP-2470 singleton factory, deployed at the same address on every
/// chain that supports pre-EIP-155 transactions.
pub const SINGLETON_FACTORY: Address =
    H160(hex!("ce0042B868300000d44A59004Da54A005ffdcf9f"));

/// Salt passed to the factory for every deployment.
pub const ZERO_SALT: [u8; 32] = [0; 32];

const CREATE2_PREFIX: u8 = 0xff;

/// Computes the CREATE2 address the factory assigns to `init_code`.
///
/// `keccak256(0xff ++ factory ++ salt ++ keccak256(init_code))[12..]` with
/// the salt fixed to [`ZERO_SALT`], so a given contract and constructor
/// arguments map to exactly one address on every chain sharing the factory.
pub fn address_from_data(
    init_code: impl AsRef<[u8]>,
    factory: Address,
) -> Address {
    let init_code_hash = keccak256(init_code);

    let mut preimage = [0u8; 85];
    preimage[0] = CREATE2_PREFIX;
    preimage[1..21].copy_from_slice(factory.as_bytes());
    preimage[21..53].copy_from_slice(&ZERO_SALT);
    preimage[53..].copy_from_slice(&init_code_hash);

    Address::from_slice(&keccak256(preimage)[12..])
}
