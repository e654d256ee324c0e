//! JSON-RPC implementation of [`DppLedger`]
//!
//! Reads are single `eth_call`s. Writes fetch the sender's pending nonce and
//! the current gas price, build a legacy transaction with the configured gas
//! limit, sign it locally, submit it raw and poll until a receipt is mined.

use super::{ChainError, DppLedger, decode};
use crate::{
    CreatedDpp, DppFields, DppId, DppRecord, TxReceipt,
    config::{ChainConfig, SecretKey},
};
use anyhow::{Context, bail};
use async_trait::async_trait;
use ethers::abi::{Abi, Event, Token, Tokenize};
use ethers::contract::Contract;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockNumber, TransactionReceipt, U64, U256};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contract functions the gateway calls; checked against the ABI at startup
const REQUIRED_FUNCTIONS: [&str; 5] = [
    "getDPPHistory",
    "getFirstDPP",
    "getLastDPP",
    "addDPP",
    "updateDPP",
];

/// Client for the deployed passport contract
///
/// Built once at startup and shared by every request handler.
pub struct ContractClient {
    provider: Provider<Http>,
    contract: Contract<Provider<Http>>,
    wallet: LocalWallet,
    created_event: Event,
    chain_id: u64,
    gas_limit: u64,
}

impl ContractClient {
    /// Connect to the node and bind the contract
    ///
    /// Fails when the ABI cannot be loaded or lacks one of the passport
    /// functions, when the key or addresses do not parse, or when the chain
    /// id has to be discovered and the node cannot be reached.
    pub async fn connect(config: &ChainConfig, key: &SecretKey) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .with_context(|| format!("invalid RPC URL {}", config.rpc_url))?
            .interval(Duration::from_millis(config.receipt_poll_interval_ms));

        let address: Address = config
            .contract_address
            .parse()
            .with_context(|| format!("invalid contract address {}", config.contract_address))?;

        let abi = load_abi(&config.abi_path)?;
        for function in REQUIRED_FUNCTIONS {
            abi.function(function)
                .with_context(|| format!("ABI {} has no function {}", config.abi_path, function))?;
        }
        let created_event = abi
            .event(&config.created_event)
            .with_context(|| format!("ABI {} has no event {}", config.abi_path, config.created_event))?
            .clone();

        let chain_id = match config.chain_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .context("failed to query chain id")?
                .as_u64(),
        };

        let wallet = key
            .expose()
            .parse::<LocalWallet>()
            .context("invalid signing key")?
            .with_chain_id(chain_id);

        if let Some(expected) = &config.sender_address {
            let expected: Address = expected
                .parse()
                .with_context(|| format!("invalid sender address {}", expected))?;
            if expected != wallet.address() {
                bail!(
                    "signing key belongs to {:?}, not the configured sender {:?}",
                    wallet.address(),
                    expected
                );
            }
        }

        info!(
            "Bound contract {:?} on chain {} as sender {:?}",
            address,
            chain_id,
            wallet.address()
        );

        let contract = Contract::new(address, abi, Arc::new(provider.clone()));

        Ok(Self {
            provider,
            contract,
            wallet,
            created_event,
            chain_id,
            gas_limit: config.gas_limit,
        })
    }

    /// Address that signs and pays for write transactions
    pub fn sender(&self) -> Address {
        self.wallet.address()
    }

    async fn read(&self, function: &str, id: DppId) -> Result<Token, ChainError> {
        debug!("Calling {}({})", function, id);

        self.contract
            .method::<_, Token>(function, U256::from(id))
            .map_err(|e| ChainError::Abi(e.to_string()))?
            .call()
            .await
            .map_err(|e| ChainError::Call(e.to_string()))
    }

    /// Sign and submit a state-changing call, then wait for its receipt
    ///
    /// Returns `Ok(None)` when the node dropped the transaction.
    async fn submit<T: Tokenize + Send>(
        &self,
        function: &str,
        args: T,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let sender = self.wallet.address();

        let nonce = self
            .provider
            .get_transaction_count(sender, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        debug!("{}: nonce {} gas price {}", function, nonce, gas_price);

        let mut tx = self
            .contract
            .method::<_, Token>(function, args)
            .map_err(|e| ChainError::Abi(e.to_string()))?
            .legacy()
            .tx;
        tx.set_from(sender)
            .set_nonce(nonce)
            .set_gas(self.gas_limit)
            .set_gas_price(gas_price)
            .set_chain_id(self.chain_id);

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let tx_hash = tx.hash(&signature);

        let pending = self
            .provider
            .send_raw_transaction(tx.rlp_signed(&signature))
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        info!("Submitted {} as {:#x}", function, tx_hash);

        let receipt = pending.await.map_err(|e| ChainError::Rpc(e.to_string()))?;
        if receipt.is_none() {
            warn!("Transaction {:#x} dropped without a receipt", tx_hash);
        }

        Ok(receipt)
    }
}

#[async_trait]
impl DppLedger for ContractClient {
    async fn history(&self, id: DppId) -> Result<Vec<DppRecord>, ChainError> {
        decode::decode_history(self.read("getDPPHistory", id).await?)
    }

    async fn first(&self, id: DppId) -> Result<Option<DppRecord>, ChainError> {
        decode::decode_optional_record(self.read("getFirstDPP", id).await?)
    }

    async fn last(&self, id: DppId) -> Result<Option<DppRecord>, ChainError> {
        decode::decode_optional_record(self.read("getLastDPP", id).await?)
    }

    async fn add(&self, fields: DppFields) -> Result<CreatedDpp, ChainError> {
        let args = (
            fields.company_name,
            fields.product_type,
            fields.product_detail,
            U256::from(fields.manufacture_date),
        );
        let receipt = self.submit("addDPP", args).await?.ok_or_else(|| {
            ChainError::Rpc("addDPP transaction was dropped before it was mined".to_string())
        })?;
        let summary = summarize(&receipt)?;

        let dpp_id = decode::created_id(&self.created_event, self.contract.address(), &receipt.logs)
            .unwrap_or_else(|| {
                Err(ChainError::MissingEvent {
                    event: self.created_event.name.clone(),
                    tx_hash: receipt.transaction_hash,
                })
            })?;

        info!("Created DPP {} in block {}", dpp_id, summary.block_number);
        Ok(CreatedDpp {
            dpp_id,
            receipt: summary,
        })
    }

    async fn update(&self, id: DppId, fields: DppFields) -> Result<Option<TxReceipt>, ChainError> {
        let args = (
            U256::from(id),
            fields.company_name,
            fields.product_type,
            fields.product_detail,
            U256::from(fields.manufacture_date),
        );
        match self.submit("updateDPP", args).await? {
            Some(receipt) => {
                let summary = summarize(&receipt)?;
                info!("Updated DPP {} in block {}", id, summary.block_number);
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}

/// Reduce a receipt to hash and block, rejecting reverted transactions
fn summarize(receipt: &TransactionReceipt) -> Result<TxReceipt, ChainError> {
    if receipt.status == Some(U64::zero()) {
        return Err(ChainError::Reverted {
            tx_hash: receipt.transaction_hash,
        });
    }

    let block_number = receipt.block_number.ok_or_else(|| {
        ChainError::Decode(format!(
            "receipt for {:#x} has no block number",
            receipt.transaction_hash
        ))
    })?;

    Ok(TxReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: block_number.as_u64(),
    })
}

/// Load an ABI from either a bare JSON array or a build artifact with an
/// `abi` field.
pub(crate) fn load_abi(path: &str) -> anyhow::Result<Abi> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read ABI file {}", path))?;
    let mut value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("ABI file {} is not JSON", path))?;

    if let Some(abi) = value.get_mut("abi") {
        value = abi.take();
    }

    serde_json::from_value(value).with_context(|| format!("ABI file {} is not a contract ABI", path))
}
