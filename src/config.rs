// src/config.rs
//! Runtime settings for the ledger and content-store adapters.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional settings file (`identity.toml` by default)
//! 3. environment variables prefixed with `IID_` (a `.env` file is loaded
//!    into the environment first)
//!
//! ## Environment Variables
//! - `IID_RPC_URL`: JSON-RPC endpoint of the ledger
//! - `IID_CONTRACT_ADDRESS`: identity token contract address
//! - `IID_PRIVATE_KEY`: (Optional) hex private key of the main address
//! - `IID_NETWORK_ID`: (Optional) chain id, queried from the node if unset
//! - `IID_IPFS_API_URL`: (Optional) IPFS API URL (default: http://localhost:5001)

use std::path::Path;

use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_SETTINGS_FILE: &str = "identity";
pub const DEFAULT_IPFS_API_URL: &str = "http://localhost:5001";
const ENV_PREFIX: &str = "IID";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub rpc_url: String,
    pub contract_address: String,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub network_id: Option<u64>,
    pub ipfs_api_url: String,
}

impl Settings {
    /// Loads settings from `identity.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::build(File::with_name(DEFAULT_SETTINGS_FILE).required(false))
    }

    /// Loads settings from an explicit file, still overridable by the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenv().ok();
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .set_default("ipfs_api_url", DEFAULT_IPFS_API_URL)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;
        log::debug!(
            "loaded settings: rpc={} contract={} ipfs={}",
            settings.rpc_url,
            settings.contract_address,
            settings.ipfs_api_url
        );
        Ok(settings)
    }
}
