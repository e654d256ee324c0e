use ethers::types::{Address, H256};

/// Passport identifier assigned by the contract.
pub type DppId = u64;

/// A passport record as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DppRecord {
    pub company_name: String,
    pub product_type: String,
    pub product_detail: String,
    /// Seconds since the Unix epoch
    pub manufacture_date: u64,
    pub allowed_addresses: Vec<Address>,
    pub is_merged: bool,
    pub merged_from: Vec<DppId>,
}

impl DppRecord {
    /// True when every field holds its zero value, which is what the
    /// contract hands back for an identifier it has never seen.
    pub fn is_empty(&self) -> bool {
        self.company_name.is_empty()
            && self.product_type.is_empty()
            && self.product_detail.is_empty()
            && self.manufacture_date == 0
            && self.allowed_addresses.is_empty()
            && !self.is_merged
            && self.merged_from.is_empty()
    }
}

/// Writable passport fields submitted by `addDPP` and `updateDPP`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DppFields {
    pub company_name: String,
    pub product_type: String,
    pub product_detail: String,
    pub manufacture_date: u64,
}

/// Summary of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: H256,
    pub block_number: u64,
}

/// Result of a successful `addDPP` submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedDpp {
    pub dpp_id: DppId,
    pub receipt: TxReceipt,
}
