//! Error types for the HAP pairing engine.

use std::fmt;

use thiserror::Error;

/// Primary error type for all pairing operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors raised by the request/response transport collaborator.
///
/// The pairing engines propagate these unchanged and never retry; retry
/// policy belongs to the transport or its caller.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Connection closed")]
    Closed,
}

/// Protocol-level errors from the pairing state machines and validator.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PairingError {
    #[error("State TLV missing or not a single byte")]
    MalformedState,

    #[error("Unexpected pairing state 0x{actual:02x} (expected 0x{expected:02x})")]
    UnexpectedState { expected: u8, actual: u8 },

    #[error("Missing required TLV type 0x{0:02x}")]
    MissingTlv(u8),

    #[error("Accessory rejected the request: {0}")]
    RemoteRejected(ErrorCode),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    #[error("Pair-remove failed: {0}")]
    RemoveFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Wire-format parsing errors.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed TLV: {0}")]
    MalformedTlv(String),
}

/// Accessory-reported error code from the error TLV (tag 0x07).
///
/// Codes are defined by the accessory protocol; unrecognized bytes are kept
/// verbatim so callers can still inspect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown,
    Authentication,
    Backoff,
    MaxPeers,
    MaxTries,
    Unavailable,
    Busy,
    Reserved(u8),
}

impl ErrorCode {
    /// Decode from the wire byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::Unknown,
            0x02 => Self::Authentication,
            0x03 => Self::Backoff,
            0x04 => Self::MaxPeers,
            0x05 => Self::MaxTries,
            0x06 => Self::Unavailable,
            0x07 => Self::Busy,
            other => Self::Reserved(other),
        }
    }

    /// Wire byte for this code.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Unknown => 0x01,
            Self::Authentication => 0x02,
            Self::Backoff => 0x03,
            Self::MaxPeers => 0x04,
            Self::MaxTries => 0x05,
            Self::Unavailable => 0x06,
            Self::Busy => 0x07,
            Self::Reserved(other) => other,
        }
    }

    /// Whether the accessory may accept a later retry of the same request.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Backoff | Self::Busy | Self::MaxTries)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Authentication => "authentication",
            Self::Backoff => "backoff (rate limited)",
            Self::MaxPeers => "max peers",
            Self::MaxTries => "max tries",
            Self::Unavailable => "unavailable",
            Self::Busy => "busy",
            Self::Reserved(code) => return write!(f, "reserved (0x{code:02x})"),
        };
        write!(f, "{} (0x{:02x})", name, self.as_byte())
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
