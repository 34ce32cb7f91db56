//! Contract bindings for the paymaster demo
//!
//! Call ABIs are compiled in as human-readable fragments; deployment bytecode
//! comes from the zksolc artifacts (see [`artifact`]).

pub mod artifact;
pub mod bytecode;

pub use artifact::{Artifact, ArtifactStore};
pub use bytecode::hash_bytecode;

use ethers::contract::abigen;
use ethers::types::{Address, H160};

abigen!(
    DemoToken,
    r#"[
        function mint(address to, uint256 amount) external
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);

abigen!(
    VipNft,
    r#"[
        function mint(address to) external
    ]"#
);

abigen!(
    MyPaymaster,
    r#"[
        function setDapiProxy(address usdcProxy, address ethProxy) external
        function readDapi(address dapiProxy) external view returns (uint256)
    ]"#
);

abigen!(
    Greeter,
    r#"[
        function greet() external view returns (string)
        function setGreeting(string greeting) external
    ]"#
);

abigen!(
    PaymasterFlow,
    r#"[
        function approvalBased(address token, uint256 minAllowance, bytes innerInput) external
    ]"#
);

abigen!(
    ContractDeployer,
    r#"[
        function create(bytes32 salt, bytes32 bytecodeHash, bytes input) external payable returns (address)
        event ContractDeployed(address indexed deployerAddress, bytes32 indexed bytecodeHash, address indexed contractAddress)
    ]"#
);

/// zkSync system contract that performs every contract deployment (0x...8006)
pub const CONTRACT_DEPLOYER_ADDRESS: Address = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x80, 0x06,
]);

/// Artifact names of the four demo contracts
pub const TOKEN_ARTIFACT: &str = "MyERC20";
pub const NFT_ARTIFACT: &str = "VIPNFT";
pub const PAYMASTER_ARTIFACT: &str = "MyPaymaster";
pub const GREETER_ARTIFACT: &str = "Greeter";
