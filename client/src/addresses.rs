use alloy::primitives::Address;
use ocean_cli_shared::{CliError, CliResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Deployed contract addresses for one chain, as found in an Ocean-style
/// `address.json` (`{ "<network>": { "chainId": .., "Ocean": .., ... } }`).
#[derive(Debug, Clone, Deserialize)]
pub struct ContractAddresses {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "Ocean", default)]
    pub ocean: Option<String>,
    #[serde(rename = "ERC721Factory", default)]
    pub nft_factory: Option<String>,
    #[serde(rename = "Escrow", default)]
    pub escrow: Option<String>,
}

impl ContractAddresses {
    /// Entry for `chain_id` from the address file, if one is configured
    pub fn load(path: Option<&Path>, chain_id: u64) -> CliResult<Self> {
        let path = path.ok_or(CliError::ContractsUnavailable { chain_id })?;
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw, chain_id)
    }

    pub fn from_json(raw: &str, chain_id: u64) -> CliResult<Self> {
        let networks: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)?;
        networks
            .into_values()
            .filter_map(|entry| serde_json::from_value::<ContractAddresses>(entry).ok())
            .find(|entry| entry.chain_id == chain_id)
            .ok_or(CliError::ContractsUnavailable { chain_id })
    }

    pub fn ocean(&self) -> CliResult<Address> {
        self.pick("Ocean", self.ocean.as_deref())
    }

    pub fn nft_factory(&self) -> CliResult<Address> {
        self.pick("ERC721Factory", self.nft_factory.as_deref())
    }

    pub fn escrow(&self) -> CliResult<Address> {
        self.pick("Escrow", self.escrow.as_deref())
    }

    fn pick(&self, contract: &str, value: Option<&str>) -> CliResult<Address> {
        let value = value.ok_or_else(|| {
            CliError::Configuration(format!(
                "address file has no {} entry for chain {}",
                contract, self.chain_id
            ))
        })?;
        crate::chain::parse_address(value, contract)
    }
}
