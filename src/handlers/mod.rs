//! Connection handlers.
//!
//! - [`connection`]: reads one framed request, writes one framed response, closes
//! - [`requests`]: routes a decoded request to its service

pub mod connection;
pub mod requests;
