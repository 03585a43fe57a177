pub use crate::api::types::JsonRpcResponseError;
use derive_builder::UninitializedFieldError;
use ethers::{
    providers::ProviderError,
    signers::WalletError,
    types::{Address, U256},
};
use reqwest::header::InvalidHeaderValue;
use std::{fmt, time::Duration};
use thiserror::Error;

/// The crate `Error` type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Request did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Block {0} is missing its {1}")]
    IncompleteBlock(&'static str, &'static str),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    UninitializedField(#[from] UninitializedFieldError),

    #[error("Invalid launch configuration: {0}")]
    Config(String),
}

/// The crate `Result` type.
pub type Result<T> = core::result::Result<T, Error>;

/// A single rejected field of an [`crate::ActorConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every problem found while validating an actor configuration, reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Names of the rejected fields, in validation order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.field).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid actor configuration: ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Misuse of the bundle assembler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Entry sender {from:?} does not match its signer {signer:?}")]
    InvalidEntry { signer: Address, from: Address },

    #[error("Empty transactions bundle")]
    EmptyBundle,

    #[error("Call has neither a destination nor data")]
    InvalidCall,

    #[error("Nonce {nonce} for {address:?} goes backwards, expected at least {expected}")]
    NonceOrder {
        address: Address,
        nonce: U256,
        expected: U256,
    },
}

/// Relay rejection of a submitted bundle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Nonce too high: {0}")]
    NonceTooHigh(String),

    #[error("Submission rejected: {0}")]
    Other(String),
}

impl SubmissionError {
    /// Sorts a relay error message into one of the submission error classes.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowercase = message.to_lowercase();

        if lowercase.contains("nonce too low") {
            Self::NonceTooLow(message)
        } else if lowercase.contains("nonce too high") {
            Self::NonceTooHigh(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Failures of the relay JSON-RPC transport.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("JsonRpcError: {}", .0.message())]
    Response(JsonRpcResponseError),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("Failed to deserialize into JSON: {text}")]
    Deserialization {
        source: serde_json::Error,
        text: String,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Header(#[from] InvalidHeaderValue),
}
