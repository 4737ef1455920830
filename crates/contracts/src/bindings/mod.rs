//! Generated contract bindings.
//!
//! Each binding embeds its ABI and, for deployable contracts, the creation
//! bytecode. Struct and enum names come from the Solidity sources, so every
//! contract lives in its own module to keep same-named structs apart.

pub mod erc1155;
pub mod i_custom_entitlement;
pub mod i_entitlement;
pub mod i_entitlement_gated;
pub mod mock_custom_entitlement;
pub mod mock_entitlement_checker;
pub mod mock_erc20;
pub mod mock_erc721;
pub mod mock_river_registry;
pub mod rule_entitlement;
pub mod rule_entitlement_v2;
pub mod wallet_link;

pub use erc1155::Erc1155;
pub use i_custom_entitlement::ICustomEntitlement;
pub use i_entitlement::IEntitlement;
pub use i_entitlement_gated::IEntitlementGated;
pub use mock_custom_entitlement::MockCustomEntitlement;
pub use mock_entitlement_checker::MockEntitlementChecker;
pub use mock_erc20::MockErc20;
pub use mock_erc721::MockErc721;
pub use mock_river_registry::MockRiverRegistry;
pub use rule_entitlement::RuleEntitlement;
pub use rule_entitlement_v2::RuleEntitlementV2;
pub use wallet_link::WalletLink;
