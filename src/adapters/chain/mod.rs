//! Chain Adapters - EVM Interaction Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - RPC provider management with chain id validation
//! - Raw ERC-20 and Uniswap V2 pair calls
//! - Custody transfer logs, receipts and fee data (`ChainClient` port)
//! - Pair reserve pricing (`PriceSource` port)

pub mod client;
pub mod contracts;
pub mod gas;
pub mod provider;
pub mod uniswap;
pub mod validator;

pub use client::{RpcChainClient, WalletAddresses};
pub use provider::RpcProvider;
pub use uniswap::UniswapV2PriceSource;
pub use validator::ContractValidator;
