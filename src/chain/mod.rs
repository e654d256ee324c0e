//! Chain Access Module
//!
//! This module owns every interaction with the passport contract:
//! - `DppLedger`: the five operations the HTTP layer depends on
//! - `ContractClient`: the JSON-RPC implementation backed by ethers
//! - `decode`: reshaping of raw ABI tokens and event logs into domain types

mod client;
pub mod decode;

pub use client::ContractClient;

use crate::{CreatedDpp, DppFields, DppId, DppRecord, TxReceipt};
use async_trait::async_trait;
use ethers::types::H256;
use thiserror::Error;

/// Errors surfaced by the chain layer
///
/// Every variant carries the underlying message so it can be handed to the
/// caller unchanged. No distinction is made between transient and permanent
/// failures.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport or node failure (connection refused, JSON-RPC error)
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The call could not be encoded against the loaded ABI
    #[error("ABI error: {0}")]
    Abi(String),

    /// A read-only contract call failed
    #[error("Contract call failed: {0}")]
    Call(String),

    /// Local signing of a transaction failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The transaction was mined but reverted
    #[error("Transaction {tx_hash:#x} reverted")]
    Reverted { tx_hash: H256 },

    /// The creation event was absent from the receipt
    #[error("Event {event} not found in receipt of {tx_hash:#x}")]
    MissingEvent { event: String, tx_hash: H256 },

    /// The contract returned data of an unexpected shape
    #[error("Unexpected contract output: {0}")]
    Decode(String),
}

/// Operations on the passport contract
///
/// Implemented by [`ContractClient`] for a live node; handlers only see this
/// trait so tests can substitute an in-memory ledger.
#[async_trait]
pub trait DppLedger: Send + Sync {
    /// Every version of a passport, oldest first
    async fn history(&self, id: DppId) -> Result<Vec<DppRecord>, ChainError>;

    /// The first version of a passport, `None` if the contract has none
    async fn first(&self, id: DppId) -> Result<Option<DppRecord>, ChainError>;

    /// The latest version of a passport, `None` if the contract has none
    async fn last(&self, id: DppId) -> Result<Option<DppRecord>, ChainError>;

    /// Submit `addDPP` and return the identifier from the creation event
    async fn add(&self, fields: DppFields) -> Result<CreatedDpp, ChainError>;

    /// Submit `updateDPP`; `Ok(None)` when the node produced no receipt
    async fn update(&self, id: DppId, fields: DppFields) -> Result<Option<TxReceipt>, ChainError>;
}
