//! Business logic services.
//!
//! Services contain the transaction discipline, separated from the connection
//! handling. They own validation, atomic units and the mapping of store failures
//! to client-facing status messages.

pub mod history_service;
pub mod transaction_service;
