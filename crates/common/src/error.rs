use ethers::abi::AbiError;
use ethers::contract::ContractError;
use ethers::providers::{Middleware, ProviderError};
use ethers::types::Bytes;
use thiserror::Error;

/// Error types shared by the chain-facing crates
#[derive(Debug, Error)]
pub enum Error {
    /// Generic error with a message
    #[error("{0}")]
    Generic(String),

    /// Contract call or transaction failed before reaching the chain
    #[error("Contract error: {0}")]
    Contract(String),

    /// The node reverted the call; raw revert data is kept for decoding
    #[error("Execution reverted: 0x{}", hex::encode(.0))]
    Revert(Bytes),

    /// Error when decoding return data, logs or revert payloads
    #[error("Decode error: {0}")]
    Decode(String),

    /// Error when validating input data
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Transaction was mined but did not succeed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Log subscription failure
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation was cancelled before completion
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Feature is not supported
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// ABI encoding or decoding error
    #[error(transparent)]
    Abi(#[from] ethers::abi::Error),

    /// Typed ABI codec error
    #[error(transparent)]
    Codec(#[from] AbiError),

    /// RPC transport error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Any other error with its source
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a new generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a new contract error
    pub fn contract<S: Into<String>>(msg: S) -> Self {
        Error::Contract(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        Error::Transaction(msg.into())
    }

    /// Create a new subscription error
    pub fn subscription<S: Into<String>>(msg: S) -> Self {
        Error::Subscription(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Create a new not implemented error
    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Raw revert data, if the error carries any
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Error::Revert(data) => Some(data),
            _ => None,
        }
    }
}

impl<M: Middleware> From<ContractError<M>> for Error {
    fn from(err: ContractError<M>) -> Self {
        match err.as_revert() {
            Some(data) => Error::Revert(data.clone()),
            None => Error::Contract(err.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Generic(format!("I/O error: {}", err))
    }
}

/// Result type used across the workspace
pub type Result<T> = std::result::Result<T, Error>;
