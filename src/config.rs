//! Configuration Module
//!
//! This module defines all configuration structures for the gateway.
//! Settings are loaded from a TOML file and parsed using serde. Command-line
//! flags (or their environment variables, including those written to `.env`
//! by the contract migration) override the chain section.
//!
//! The transaction signing key is never part of the file. It is injected
//! through `--private-key` / `PRIVATE_KEY` only.

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Command-line arguments
///
/// Every flag can also be supplied through the environment variable named
/// next to it. `NETWORK_URL`, `CONTRACT_ADDRESS`, `PUBLIC_KEY` and
/// `PRIVATE_KEY` match the names used by the deployment scripts.
#[derive(Parser, Debug)]
#[command(name = "dpp-gateway")]
#[command(about = "REST gateway for Digital Product Passports stored on chain")]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "DPP_CONFIG", default_value = "config/default.toml")]
    pub config: String,

    /// JSON-RPC endpoint of the node
    #[arg(long, env = "NETWORK_URL")]
    pub rpc_url: Option<String>,

    /// Address of the deployed passport contract
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    /// Path to the contract ABI
    #[arg(long, env = "DPP_ABI_PATH")]
    pub abi_path: Option<String>,

    /// Expected sender address; must match the signing key
    #[arg(long, env = "PUBLIC_KEY")]
    pub sender_address: Option<String>,

    /// Hex-encoded signing key
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<SecretKey>,

    /// Log filter
    #[arg(long, env = "DPP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// The signing key, which has no default
    pub fn secret_key(&self) -> anyhow::Result<SecretKey> {
        self.private_key
            .clone()
            .context("PRIVATE_KEY (or --private-key) must be set to the signing key")
    }
}

/// Main configuration structure
///
/// Contains all configuration sections for the gateway.
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [api]
/// host = "0.0.0.0"
/// port = 5000
///
/// [chain]
/// rpc_url = "http://127.0.0.1:8545"
/// contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
/// abi_path = "config/abi.json"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub chain: ChainConfig,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 5000)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Blockchain connection configuration
///
/// Settings for reaching the node and the deployed passport contract.
///
/// # Fields
/// - `rpc_url`: JSON-RPC endpoint of the node (e.g., "http://127.0.0.1:8545")
/// - `contract_address`: Address of the deployed DPP contract
/// - `abi_path`: Path to the contract ABI (bare array or build artifact)
/// - `chain_id`: Chain id used for signing; queried from the node when absent
/// - `gas_limit`: Fixed gas limit attached to every write transaction
/// - `receipt_poll_interval_ms`: How often to poll for a mined receipt
/// - `created_event`: Name of the event emitted by `addDPP`
/// - `sender_address`: Optional expected sender; must match the signing key
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub abi_path: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_created_event")]
    pub created_event: String,
    #[serde(default)]
    pub sender_address: Option<String>,
}

fn default_gas_limit() -> u64 {
    250_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_created_event() -> String {
    "DPPCreated".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// # fn main() -> anyhow::Result<()> {
    /// let config = dpp_gateway::Config::load("config/default.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("invalid configuration")?;
        Ok(config)
    }

    /// Override chain settings with the values given on the command line
    /// or through the environment. Blank values are ignored.
    pub fn apply_args(&mut self, args: &Args) {
        let given = |value: &Option<String>| {
            value
                .as_ref()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        if let Some(url) = given(&args.rpc_url) {
            self.chain.rpc_url = url;
        }
        if let Some(address) = given(&args.contract_address) {
            self.chain.contract_address = address;
        }
        if let Some(path) = given(&args.abi_path) {
            self.chain.abi_path = path;
        }
        if let Some(sender) = given(&args.sender_address) {
            self.chain.sender_address = Some(sender);
        }
    }
}

/// Hex-encoded private key used to sign write transactions.
///
/// The value is redacted from `Debug` output so the whole [`Config`] and
/// this key can be logged side by side without leaking it.
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for SecretKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().trim_start_matches("0x");
        if value.is_empty() {
            return Err("signing key must not be empty".to_string());
        }
        Ok(Self(value.to_string()))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [api]
        host = "127.0.0.1"
        port = 5000

        [chain]
        rpc_url = "http://127.0.0.1:8545"
        contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        abi_path = "config/abi.json"
    "#;

    /// Environment variable bound to the flag with the given id
    fn env_of(id: &str) -> Option<String> {
        Args::command()
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_env())
            .map(|name| name.to_string_lossy().into_owned())
    }

    #[test]
    fn test_parse_applies_chain_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.api.port, 5000);
        assert_eq!(config.chain.gas_limit, 250_000);
        assert_eq!(config.chain.receipt_poll_interval_ms, 500);
        assert_eq!(config.chain.created_event, "DPPCreated");
        assert!(config.chain.chain_id.is_none());
        assert!(config.chain.sender_address.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_chain_section() {
        let err = Config::parse("[api]\nhost = \"0.0.0.0\"\nport = 1\n").unwrap_err();
        assert!(format!("{:#}", err).contains("chain"));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api.host, "127.0.0.1");
    }

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_rpc_url_reads_network_url() {
        assert_eq!(env_of("rpc_url").as_deref(), Some("NETWORK_URL"));
    }

    #[test]
    fn test_contract_address_reads_deploy_output() {
        assert_eq!(env_of("contract_address").as_deref(), Some("CONTRACT_ADDRESS"));
    }

    #[test]
    fn test_sender_reads_public_key() {
        assert_eq!(env_of("sender_address").as_deref(), Some("PUBLIC_KEY"));
    }

    #[test]
    fn test_private_key_reads_private_key() {
        assert_eq!(env_of("private_key").as_deref(), Some("PRIVATE_KEY"));
    }

    #[test]
    fn test_args_override_file_values() {
        let args = Args::try_parse_from([
            "dpp-gateway",
            "--rpc-url",
            "http://node:8545",
            "--contract-address",
            "0x0000000000000000000000000000000000000001",
            "--sender-address",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--abi-path",
            " ",
        ])
        .unwrap();

        let mut config = Config::parse(MINIMAL).unwrap();
        config.apply_args(&args);

        assert_eq!(config.chain.rpc_url, "http://node:8545");
        assert_eq!(
            config.chain.contract_address,
            "0x0000000000000000000000000000000000000001"
        );
        assert_eq!(
            config.chain.sender_address.as_deref(),
            Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        // Blank values leave the file setting alone
        assert_eq!(config.chain.abi_path, "config/abi.json");
    }

    #[test]
    fn test_secret_key_from_flag() {
        let args = Args::try_parse_from(["dpp-gateway", "--private-key", "0xdeadbeef"]).unwrap();
        let key = args.secret_key().unwrap();

        assert_eq!(key.expose(), "deadbeef");
        assert!(!format!("{:?}", args).contains("deadbeef"));
    }

    #[test]
    fn test_secret_key_rejects_blank() {
        assert!("  ".parse::<SecretKey>().is_err());
        assert!("0x".parse::<SecretKey>().is_err());
    }
}
