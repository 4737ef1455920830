//! Minimal ERC-1155 surface used for balance checks.

use ethers::contract::abigen;

abigen!(
    Erc1155,
    r#"[
        function balanceOf(address account, uint256 id) external view returns (uint256)
        function balanceOfBatch(address[] accounts, uint256[] ids) external view returns (uint256[])
    ]"#
);
