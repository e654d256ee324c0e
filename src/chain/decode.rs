//! Decoding of contract outputs
//!
//! The contract returns passports as the tuple
//! `(string,string,string,uint256,address[],bool,uint256[])`.
//! History calls return an array of those tuples. Creation is reported
//! through an event whose payload carries the new identifier.

use super::ChainError;
use crate::{DppId, DppRecord};
use ethers::abi::{Event, RawLog, Token};
use ethers::types::{Address, Log, U256};

/// Decode the result of `getDPPHistory`
pub fn decode_history(token: Token) -> Result<Vec<DppRecord>, ChainError> {
    match token {
        Token::Array(items) | Token::FixedArray(items) => {
            items.into_iter().map(decode_record).collect()
        }
        other => Err(unexpected("history", "an array of records", &other)),
    }
}

/// Decode the result of `getFirstDPP` / `getLastDPP`
///
/// A zero-valued record means the identifier is unknown and maps to `None`.
pub fn decode_optional_record(token: Token) -> Result<Option<DppRecord>, ChainError> {
    let record = decode_record(token)?;
    Ok((!record.is_empty()).then_some(record))
}

/// Decode a single record tuple
pub fn decode_record(token: Token) -> Result<DppRecord, ChainError> {
    let fields = match token {
        Token::Tuple(fields) => fields,
        other => return Err(unexpected("record", "a tuple", &other)),
    };

    let [
        company_name,
        product_type,
        product_detail,
        manufacture_date,
        allowed_addresses,
        is_merged,
        merged_from,
    ]: [Token; 7] = fields.try_into().map_err(|fields: Vec<Token>| {
        ChainError::Decode(format!("record has {} fields, expected 7", fields.len()))
    })?;

    Ok(DppRecord {
        company_name: string_field("companyName", company_name)?,
        product_type: string_field("productType", product_type)?,
        product_detail: string_field("productDetail", product_detail)?,
        manufacture_date: uint_field("manufactureDate", manufacture_date)?,
        allowed_addresses: array_field("allowedAddresses", allowed_addresses)?
            .into_iter()
            .map(|token| address_field("allowedAddresses", token))
            .collect::<Result<_, _>>()?,
        is_merged: bool_field("isMerged", is_merged)?,
        merged_from: array_field("mergedFrom", merged_from)?
            .into_iter()
            .map(|token| uint_field("mergedFrom", token))
            .collect::<Result<_, _>>()?,
    })
}

/// Find the creation event in `logs` and pull the new identifier out of it
///
/// Only logs emitted by `contract` whose first topic is the event signature
/// are considered. The identifier is the parameter named `dppId` when the
/// event has one, otherwise the first unsigned integer parameter.
pub fn created_id(event: &Event, contract: Address, logs: &[Log]) -> Option<Result<DppId, ChainError>> {
    let signature = event.signature();

    logs.iter()
        .filter(|log| log.address == contract)
        .filter(|log| event.anonymous || log.topics.first() == Some(&signature))
        .find_map(|log| {
            let raw = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            // Logs that do not parse against the event belong to someone else
            let parsed = event.parse_log(raw).ok()?;

            let by_name = parsed
                .params
                .iter()
                .find(|param| param.name == "dppId")
                .map(|param| param.value.clone());
            let value = by_name.or_else(|| {
                parsed
                    .params
                    .iter()
                    .find(|param| matches!(param.value, Token::Uint(_)))
                    .map(|param| param.value.clone())
            });

            Some(match value {
                Some(token) => uint_field("dppId", token),
                None => Err(ChainError::Decode(format!(
                    "event {} carries no integer identifier",
                    event.name
                ))),
            })
        })
}

fn string_field(name: &str, token: Token) -> Result<String, ChainError> {
    match token {
        Token::String(value) => Ok(value),
        other => Err(unexpected(name, "a string", &other)),
    }
}

fn uint_field(name: &str, token: Token) -> Result<u64, ChainError> {
    match token {
        Token::Uint(value) => to_u64(name, value),
        other => Err(unexpected(name, "an unsigned integer", &other)),
    }
}

fn bool_field(name: &str, token: Token) -> Result<bool, ChainError> {
    match token {
        Token::Bool(value) => Ok(value),
        other => Err(unexpected(name, "a boolean", &other)),
    }
}

fn address_field(name: &str, token: Token) -> Result<Address, ChainError> {
    match token {
        Token::Address(value) => Ok(value),
        other => Err(unexpected(name, "an address", &other)),
    }
}

fn array_field(name: &str, token: Token) -> Result<Vec<Token>, ChainError> {
    match token {
        Token::Array(items) | Token::FixedArray(items) => Ok(items),
        other => Err(unexpected(name, "an array", &other)),
    }
}

fn to_u64(name: &str, value: U256) -> Result<u64, ChainError> {
    if value > U256::from(u64::MAX) {
        return Err(ChainError::Decode(format!(
            "{} value {} does not fit in 64 bits",
            name, value
        )));
    }
    Ok(value.as_u64())
}

fn unexpected(name: &str, expected: &str, got: &Token) -> ChainError {
    ChainError::Decode(format!("{} should be {}, got {:?}", name, expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{EventParam, ParamType};
    use ethers::types::{Bytes, H256};

    fn record_token(name: &str, date: u64) -> Token {
        Token::Tuple(vec![
            Token::String(name.to_string()),
            Token::String("iPhone".to_string()),
            Token::String("iPhone 12 Pro".to_string()),
            Token::Uint(U256::from(date)),
            Token::Array(vec![Token::Address(Address::from_low_u64_be(0xaa))]),
            Token::Bool(false),
            Token::Array(vec![Token::Uint(U256::from(3))]),
        ])
    }

    fn empty_record_token() -> Token {
        Token::Tuple(vec![
            Token::String(String::new()),
            Token::String(String::new()),
            Token::String(String::new()),
            Token::Uint(U256::zero()),
            Token::Array(vec![]),
            Token::Bool(false),
            Token::Array(vec![]),
        ])
    }

    fn created_event() -> Event {
        Event {
            name: "DPPCreated".to_string(),
            inputs: vec![
                EventParam {
                    name: "dppId".to_string(),
                    kind: ParamType::Uint(256),
                    indexed: true,
                },
                EventParam {
                    name: "companyName".to_string(),
                    kind: ParamType::String,
                    indexed: false,
                },
            ],
            anonymous: false,
        }
    }

    fn created_log(event: &Event, contract: Address, id: u64) -> Log {
        Log {
            address: contract,
            topics: vec![event.signature(), H256::from_low_u64_be(id)],
            data: Bytes::from(ethers::abi::encode(&[Token::String("Apple".to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_record_maps_all_fields() {
        let record = decode_record(record_token("Apple", 1609459200)).unwrap();

        assert_eq!(record.company_name, "Apple");
        assert_eq!(record.product_type, "iPhone");
        assert_eq!(record.product_detail, "iPhone 12 Pro");
        assert_eq!(record.manufacture_date, 1609459200);
        assert_eq!(record.allowed_addresses, vec![Address::from_low_u64_be(0xaa)]);
        assert!(!record.is_merged);
        assert_eq!(record.merged_from, vec![3]);
    }

    #[test]
    fn test_decode_record_rejects_short_tuple() {
        let err = decode_record(Token::Tuple(vec![Token::String("x".into())])).unwrap_err();
        assert!(err.to_string().contains("expected 7"));
    }

    #[test]
    fn test_decode_record_names_bad_field() {
        let mut fields = match record_token("Apple", 0) {
            Token::Tuple(fields) => fields,
            _ => unreachable!(),
        };
        fields[5] = Token::String("yes".into());

        let err = decode_record(Token::Tuple(fields)).unwrap_err();
        assert!(err.to_string().contains("isMerged"));
    }

    #[test]
    fn test_decode_record_rejects_oversized_date() {
        let mut fields = match record_token("Apple", 0) {
            Token::Tuple(fields) => fields,
            _ => unreachable!(),
        };
        fields[3] = Token::Uint(U256::MAX);

        assert!(matches!(
            decode_record(Token::Tuple(fields)),
            Err(ChainError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_history_preserves_order() {
        let token = Token::Array(vec![record_token("Apple", 1), record_token("Samsung", 2)]);
        let history = decode_history(token).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].company_name, "Apple");
        assert_eq!(history[1].company_name, "Samsung");
    }

    #[test]
    fn test_decode_history_requires_array() {
        assert!(decode_history(record_token("Apple", 1)).is_err());
    }

    #[test]
    fn test_zero_record_is_absent() {
        assert_eq!(decode_optional_record(empty_record_token()).unwrap(), None);
        assert!(decode_optional_record(record_token("Apple", 1)).unwrap().is_some());
    }

    #[test]
    fn test_created_id_from_event_log() {
        let event = created_event();
        let contract = Address::from_low_u64_be(1);
        let logs = vec![created_log(&event, contract, 42)];

        let id = created_id(&event, contract, &logs).unwrap().unwrap();
        assert_eq!(id, 42);
    }

    #[test]
    fn test_created_id_ignores_other_contracts() {
        let event = created_event();
        let logs = vec![created_log(&event, Address::from_low_u64_be(2), 42)];

        assert!(created_id(&event, Address::from_low_u64_be(1), &logs).is_none());
    }

    #[test]
    fn test_created_id_falls_back_to_first_uint() {
        let mut event = created_event();
        event.inputs[0].name = "id".to_string();
        let contract = Address::from_low_u64_be(1);
        let logs = vec![created_log(&event, contract, 9)];

        let id = created_id(&event, contract, &logs).unwrap().unwrap();
        assert_eq!(id, 9);
    }
}
