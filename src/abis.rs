use ethers::contract::abigen;

abigen!(
    SingletonFactory,
    r#"[
        function deploy(bytes initCode, bytes32 salt) public returns (address createdContract)
    ]"#
);
