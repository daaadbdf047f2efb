//! Contract Calls - Raw ABI Encoding for the Few Calls We Need
//!
//! ERC-20 `balanceOf`, the `Transfer` event topic, and the Uniswap V2
//! pair's `getReserves` / `token0`. Calldata is built from keccak256
//! selectors; return data is decoded by word offset.

use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};

/// `Transfer(address,address,uint256)` event signature.
pub fn transfer_topic() -> B256 {
    keccak256(b"Transfer(address,address,uint256)")
}

/// 4-byte selector followed by the given 32-byte words.
pub fn encode_call(signature: &str, words: &[B256]) -> Bytes {
    let mut data = keccak256(signature.as_bytes())[..4].to_vec();
    for word in words {
        data.extend_from_slice(word.as_slice());
    }
    Bytes::from(data)
}

/// 32-byte word `index` of ABI return data.
pub fn word_at(data: &[u8], index: usize) -> Result<U256> {
    let start = index * 32;
    let word = data
        .get(start..start + 32)
        .with_context(|| format!("Return data too short: {} bytes, want word {index}", data.len()))?;
    Ok(U256::from_be_slice(word))
}

/// Address encoded in word `index` of ABI return data.
pub fn address_at(data: &[u8], index: usize) -> Result<Address> {
    let word = word_at(data, index)?;
    Ok(Address::from_word(B256::from(word)))
}

async fn call(provider: &Arc<dyn Provider + Send + Sync>, to: Address, input: Bytes) -> Result<Bytes> {
    provider
        .call(&TransactionRequest::default().to(to).input(input.into()))
        .await
        .with_context(|| format!("eth_call to {to} failed"))
}

/// ERC-20 `balanceOf(owner)`.
pub async fn erc20_balance_of(
    provider: &Arc<dyn Provider + Send + Sync>,
    token: Address,
    owner: Address,
) -> Result<U256> {
    let input = encode_call("balanceOf(address)", &[owner.into_word()]);
    let out = call(provider, token, input).await.context("balanceOf call failed")?;
    word_at(&out, 0)
}

/// Uniswap V2 `getReserves()`: `(reserve0, reserve1)`.
pub async fn pair_reserves(
    provider: &Arc<dyn Provider + Send + Sync>,
    pair: Address,
) -> Result<(U256, U256)> {
    let out = call(provider, pair, encode_call("getReserves()", &[]))
        .await
        .context("getReserves call failed")?;
    Ok((word_at(&out, 0)?, word_at(&out, 1)?))
}

/// Uniswap V2 `token0()`.
pub async fn pair_token0(provider: &Arc<dyn Provider + Send + Sync>, pair: Address) -> Result<Address> {
    let out = call(provider, pair, encode_call("token0()", &[]))
        .await
        .context("token0 call failed")?;
    address_at(&out, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(&encode_call("balanceOf(address)", &[])[..], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&encode_call("getReserves()", &[])[..], &[0x09, 0x02, 0xf1, 0xac]);
        assert_eq!(&encode_call("token0()", &[])[..], &[0x0d, 0xfe, 0x16, 0x81]);
    }

    #[test]
    fn test_transfer_topic() {
        assert_eq!(
            transfer_topic().to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_words() {
        let mut data = vec![0u8; 96];
        data[31] = 7;
        data[63] = 9;
        data[76..96].copy_from_slice(Address::repeat_byte(0x11).as_slice());
        assert_eq!(word_at(&data, 0).unwrap(), U256::from(7u64));
        assert_eq!(word_at(&data, 1).unwrap(), U256::from(9u64));
        assert_eq!(address_at(&data, 2).unwrap(), Address::repeat_byte(0x11));
        assert!(word_at(&data, 3).is_err());
    }
}
