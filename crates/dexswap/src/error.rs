use thiserror::Error;

/// Unified error type for the swap widget core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),

    #[error("amount error: {0}")]
    Units(#[from] UnitsError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("token registry error: {0}")]
    TokenRegistry(String),
}

/// Errors during signature parsing and ABI encoding/decoding.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("selector mismatch: expected {expected}, got {actual}")]
    SelectorMismatch { expected: String, actual: String },

    #[error("invalid ABI encoding: {0}")]
    InvalidEncoding(String),

    #[error("argument count mismatch: signature takes {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("argument {index} does not match parameter type {expected}")]
    ArgumentType { index: usize, expected: String },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors converting between decimal strings and base units.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Errors from a single rate oracle query.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl From<AbiError> for OracleError {
    fn from(e: AbiError) -> Self {
        OracleError::InvalidResponse(e.to_string())
    }
}

/// Preconditions that stop a swap from being built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no usable rate available")]
    NoRate,

    #[error("amount to send is zero")]
    ZeroAmount,

    #[error("slippage {slippage_tenths}/1000 plus fee {fee_promille}/1000 leaves nothing to receive")]
    SlippageTooHigh {
        slippage_tenths: u32,
        fee_promille: u32,
    },

    #[error("invalid amount: {0}")]
    Amount(#[from] UnitsError),

    #[error("cannot encode swap call: {0}")]
    Encoding(String),
}

/// Errors reported by the host wallet layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("rejected by user")]
    Rejected,

    #[error("wallet not connected")]
    NotConnected,

    #[error("wallet error: {0}")]
    Other(String),
}

/// Errors from the submission controller itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    Busy,

    #[error("approval failed: {0}")]
    Approval(WalletError),

    #[error("swap not sent: {0}")]
    Swap(WalletError),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
