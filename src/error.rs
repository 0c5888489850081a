//! Error types for the settlements ledger

use std::fmt;

#[derive(Debug, Clone)]
pub enum LedgerError {
    OnlyAdmin,
    InsufficientClientBalance,
    InsufficientNativeBalance,
    AlreadyInitialized,
    NotInitialized,
    InvalidAmount,
    BalanceOverflow,
    TokenTransferFailed(String),
    NotAcceptEtherDirectly,
    DatabaseError(String),
    IoError(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::OnlyAdmin => write!(f, "Caller is not the admin"),
            LedgerError::InsufficientClientBalance => write!(f, "Insufficient client balance"),
            LedgerError::InsufficientNativeBalance => write!(f, "Insufficient native balance"),
            LedgerError::AlreadyInitialized => write!(f, "Ledger is already initialized"),
            LedgerError::NotInitialized => write!(f, "Ledger is not initialized"),
            LedgerError::InvalidAmount => write!(f, "Amount must be greater than zero"),
            LedgerError::BalanceOverflow => write!(f, "Balance overflow"),
            LedgerError::TokenTransferFailed(msg) => write!(f, "Token transfer failed: {}", msg),
            LedgerError::NotAcceptEtherDirectly => {
                write!(f, "Direct value transfers are not accepted")
            }
            LedgerError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            LedgerError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
