use ethers::types::{Address, Bytes, H256};
use std::str::FromStr;

// Cantidades del explorer: "0x1a2b" (proxy / getLogs) o decimal ("12345", getcontractcreation)
pub fn parse_quantity(value: &str) -> Result<u64, ConversionError> {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        // El explorer devuelve "0x" para logIndex/transactionIndex cero
        Some("") => Ok(0),
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16)
            .map_err(|_| ConversionError::InvalidQuantity(value.to_string())),
        None => trimmed
            .parse::<u64>()
            .map_err(|_| ConversionError::InvalidQuantity(value.to_string())),
    }
}

pub fn parse_hex_bytes(value: &str) -> Result<Bytes, ConversionError> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(Bytes::default());
    }
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| ConversionError::InvalidHex(format!("{}: {}", value, e)))
}

pub fn parse_h256(value: &str) -> Result<H256, ConversionError> {
    H256::from_str(value.trim()).map_err(|e| ConversionError::InvalidHash(format!("{}: {}", value, e)))
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(format!("{}: {}", s, e)))
}

// Para query params: 0x + 40 hex en minúsculas
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

pub fn h256_to_string(hash: H256) -> String {
    format!("{:?}", hash)
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),
    #[error("Invalid 32-byte hash: {0}")]
    InvalidHash(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
