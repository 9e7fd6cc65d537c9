//! Data models shared by the codec, the ledger store and the handlers.

/// Account entity read from the ledger
pub mod account;
/// Fixed-point amounts
pub mod money;
pub mod request;
pub mod response;
/// Append-only transaction log entries
pub mod transaction;
