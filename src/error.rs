//! Error types.
//!
//! Errors are split by layer. None of them is ever written to a client verbatim:
//! the handlers translate every failure into one of the fixed status messages in
//! [`Response`](crate::models::response::Response) and log the detail instead.
//!
//! # Error Categories
//!
//! - **Store Errors** (`StoreError`): anything that goes wrong inside the ledger;
//!   always rolls back the enclosing atomic unit
//! - **Connection Errors** (`ConnectionError`): transport failures while serving one
//!   client; logged, no response is sent
//! - **Startup Errors** (`AppError`): configuration, pool or migration failures that
//!   stop the server before it accepts connections

use std::io;

use crate::codec::CodecError;

/// Failure inside the ledger store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed (e.g., connection error, query error, constraint violation).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying a delta would overflow the balance column.
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(String),

    /// A CHECK or UNIQUE rule of the in-memory ledger was violated.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Failure injected by the in-memory ledger.
    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// Transport-level failure while serving one connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Client did not send a complete request in time.
    #[error("Timed out reading request")]
    ReadTimeout,

    /// Client stopped reading before the response was flushed.
    #[error("Timed out writing response")]
    WriteTimeout,

    /// Client closed the connection before a request arrived.
    #[error("Client closed the connection")]
    Disconnected,

    /// Socket error (reset, broken pipe, truncated frame).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(err) => ConnectionError::Io(err),
            other => ConnectionError::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}

/// Application-wide startup error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
