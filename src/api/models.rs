//! Request and response bodies
//!
//! Dates travel as `YYYY-MM-DD` strings over HTTP and as UTC epoch seconds
//! on chain. Addresses are rendered with their EIP-55 checksum.

use super::ApiError;
use crate::{CreatedDpp, DppFields, DppId, DppRecord, TxReceipt};
use chrono::{DateTime, NaiveDate};
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Body of `POST /dpp` and `PUT /dpp/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DppPayload {
    pub company_name: String,
    pub product_type: String,
    pub product_detail: String,
    pub manufacture_date: String,
}

impl DppPayload {
    /// Validate the payload and convert the date for submission
    pub fn into_fields(self) -> Result<DppFields, ApiError> {
        Ok(DppFields {
            manufacture_date: parse_date(&self.manufacture_date)?,
            company_name: self.company_name,
            product_type: self.product_type,
            product_detail: self.product_detail,
        })
    }
}

/// Body of `PUT /dpp/update`, which carries the identifier itself
#[derive(Debug, Deserialize)]
pub struct UpdatePayload {
    #[serde(rename = "dppId")]
    pub dpp_id: Value,
    #[serde(flatten)]
    pub fields: DppPayload,
}

impl UpdatePayload {
    pub fn id(&self) -> Result<DppId, ApiError> {
        match &self.dpp_id {
            Value::Number(number) => number
                .as_u64()
                .ok_or_else(|| invalid_id(&number.to_string())),
            Value::String(text) => parse_id(text),
            Value::Null => Err(missing_id()),
            other => Err(invalid_id(&other.to_string())),
        }
    }
}

/// Query string of the `?dppId=` read routes
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(rename = "dppId")]
    pub dpp_id: Option<String>,
}

/// A passport version as returned to HTTP clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DppView {
    pub company_name: String,
    pub product_type: String,
    pub product_detail: String,
    pub manufacture_date: String,
    pub allowed_addresses: Vec<String>,
    pub is_merged: bool,
    pub merged_from: Vec<String>,
}

impl From<DppRecord> for DppView {
    fn from(record: DppRecord) -> Self {
        Self {
            company_name: record.company_name,
            product_type: record.product_type,
            product_detail: record.product_detail,
            manufacture_date: format_date(record.manufacture_date),
            allowed_addresses: record
                .allowed_addresses
                .iter()
                .map(|address| to_checksum(address, None))
                .collect(),
            is_merged: record.is_merged,
            merged_from: record.merged_from.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction_hash: String,
    pub block_number: u64,
}

impl From<TxReceipt> for TransactionView {
    fn from(receipt: TxReceipt) -> Self {
        Self {
            transaction_hash: format!("{:#x}", receipt.transaction_hash),
            block_number: receipt.block_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    #[serde(rename = "dppId")]
    pub dpp_id: String,
    pub transaction: TransactionView,
}

impl From<CreatedDpp> for CreateResponse {
    fn from(created: CreatedDpp) -> Self {
        Self {
            dpp_id: created.dpp_id.to_string(),
            transaction: created.receipt.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    pub transaction: TransactionView,
}

/// Payload returned when an update produced no receipt
#[derive(Debug, Serialize)]
pub struct UpdateFailure {
    pub status: &'static str,
    pub error: &'static str,
}

impl Default for UpdateFailure {
    fn default() -> Self {
        Self {
            status: "error",
            error: "Transaction failed",
        }
    }
}

/// Parse a passport identifier taken from a path or query string
pub fn parse_id(raw: &str) -> Result<DppId, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(missing_id());
    }
    raw.parse().map_err(|_| invalid_id(raw))
}

/// Convert `YYYY-MM-DD` into UTC epoch seconds
pub fn parse_date(value: &str) -> Result<u64, ApiError> {
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ApiError::BadRequest("Incorrect date format, should be YYYY-MM-DD".to_string())
    })?;

    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .unwrap_or_default();

    u64::try_from(timestamp).map_err(|_| {
        ApiError::BadRequest("manufactureDate must not be before 1970-01-01".to_string())
    })
}

/// Render epoch seconds as a UTC `YYYY-MM-DD` date
pub fn format_date(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|moment| moment.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn missing_id() -> ApiError {
    ApiError::BadRequest("Missing 'dppId' parameter".to_string())
}

fn invalid_id(raw: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid 'dppId' {}: must be a non-negative integer",
        raw
    ))
}
