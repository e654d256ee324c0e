//! This crate exposes Digital Product Passports stored in a smart contract
//! over a small REST API.
//! It includes modules for data types, the HTTP layer, contract access,
//! and configuration.

pub mod types; // Passport records, write payloads and receipt summaries.
pub mod api; // REST routes, request validation and error mapping.
pub mod chain; // Contract reads, signed writes and output decoding.
pub mod config; // Defines and loads gateway configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use chain::{ChainError, ContractClient, DppLedger};
