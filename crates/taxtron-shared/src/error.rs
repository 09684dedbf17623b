use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CnicError {
    #[error("Invalid CNIC format. Use XXXXX-XXXXXXX-X or 13 digits")]
    InvalidFormat,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
