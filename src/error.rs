use thiserror::Error;

/// Reasons a manufacturer data hex string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("hex string has odd length {0}")]
    OddLength(usize),
    #[error("invalid hex character {character:?} at index {index}")]
    InvalidHexCharacter { character: char, index: usize },
    /// Non-empty input that cannot hold the 2-byte company identifier.
    #[error("manufacturer data is {len} byte(s) long, expected at least 2")]
    TooShort { len: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bluetooth(#[from] btleplug::Error),
    #[error("no bluetooth adapter at index {index}")]
    AdapterNotFound { index: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
