//! # ABI Codec
//!
//! Pure decoding helpers for event topics and `eth_call` return data, plus the one
//! argument encoding the indexer needs (`int24`). No I/O, no state.
//!
//! Topics are always 32-byte words. Indexed `address`, `bool` and `int24` values are
//! right-aligned in the word, so decoding only looks at the low bytes.

use ethers::types::{Address, H256, U256};
use ethers::utils::{keccak256, to_checksum};
use thiserror::Error;

pub const INT24_MIN: i32 = -(1 << 23);
pub const INT24_MAX: i32 = (1 << 23) - 1;
pub const UINT24_MAX: u32 = (1 << 24) - 1;

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("int24 out of range: {0}")]
    Int24OutOfRange(i64),
}

/// First four bytes of `keccak256(signature)`, e.g. `tickSpacingToFee(int24)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic0 for an event signature such as `PoolCreated(address,address,int24,address)`.
pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

pub fn decode_topic_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// EIP-55 formatting used for every address we hand to the output layer.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

pub fn decode_topic_bool(topic: &H256) -> bool {
    !topic.is_zero()
}

/// Low 24 bits of the word, sign-extended from bit 23.
pub fn decode_topic_int24(topic: &H256) -> i32 {
    let bytes = topic.as_bytes();
    let raw = (u32::from(bytes[29]) << 16) | (u32::from(bytes[30]) << 8) | u32::from(bytes[31]);
    if raw & 0x80_0000 != 0 {
        raw as i32 - (1 << 24)
    } else {
        raw as i32
    }
}

/// Two's-complement 32-byte encoding of an `int24` call argument.
pub fn encode_int24(value: i32) -> Result<[u8; WORD], AbiError> {
    if !(INT24_MIN..=INT24_MAX).contains(&value) {
        return Err(AbiError::Int24OutOfRange(i64::from(value)));
    }
    let mut word = if value < 0 { [0xff; WORD] } else { [0u8; WORD] };
    word[WORD - 4..].copy_from_slice(&value.to_be_bytes());
    Ok(word)
}

/// `selector || encode_int24(value)`.
pub fn encode_call_int24(signature: &str, value: i32) -> Result<Vec<u8>, AbiError> {
    let mut calldata = Vec::with_capacity(4 + WORD);
    calldata.extend_from_slice(&selector(signature));
    calldata.extend_from_slice(&encode_int24(value)?);
    Ok(calldata)
}

/// Reads the last 32-byte word of a return value. `None` when shorter than one word.
pub fn decode_uint256(ret: &[u8]) -> Option<U256> {
    if ret.len() < WORD {
        return None;
    }
    Some(U256::from_big_endian(&ret[ret.len() - WORD..]))
}

/// Address stored right-aligned in the `index`-th 32-byte word of `data`.
pub fn decode_word_address(data: &[u8], index: usize) -> Option<Address> {
    let start = index.checked_mul(WORD)?;
    let word = data.get(start..start.checked_add(WORD)?)?;
    Some(Address::from_slice(&word[12..]))
}

/// Decodes `string` return values, tolerating the legacy `bytes32` form.
///
/// Exactly 32 bytes is treated as `bytes32` (trailing NULs stripped); 64 bytes or more
/// as a dynamic string `offset, length, bytes`. Anything else, invalid UTF-8, out of
/// bounds offsets/lengths and blank results decode to `None`.
pub fn decode_string(ret: &[u8]) -> Option<String> {
    if ret.len() == WORD {
        let end = ret.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
        return non_blank(std::str::from_utf8(&ret[..end]).ok()?);
    }
    if ret.len() < 2 * WORD {
        return None;
    }

    let offset = word_as_usize(ret, 0)?;
    let length = word_as_usize(ret, offset)?;
    let start = offset.checked_add(WORD)?;
    let end = start.checked_add(length)?;
    let raw = ret.get(start..end)?;
    non_blank(std::str::from_utf8(raw).ok()?)
}

// Palabra de 32 bytes en `at` interpretada como usize acotado al payload
fn word_as_usize(ret: &[u8], at: usize) -> Option<usize> {
    let word = ret.get(at..at.checked_add(WORD)?)?;
    let value = U256::from_big_endian(word);
    if value > U256::from(ret.len()) {
        return None;
    }
    Some(value.as_usize())
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
