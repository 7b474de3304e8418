//! Burrow: an encrypted in-memory key/value cache server.
//!
//! Provides:
//! - A concurrent cache with capacity, byte accounting and per-entry expiry
//! - A length-framed wire protocol with per-connection RSA key exchange
//! - Authenticated sessions gated behind hashed credentials
//! - Optional periodic snapshots for warm restart

pub mod cache;
pub mod crypto;
pub mod server;
pub mod wizard;
