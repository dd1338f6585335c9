use crate::config::{Credential, Settings};
use alloy::hex;
use alloy::primitives::{keccak256, Address};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use alloy::signers::Signer;
use ocean_cli_shared::{CliError, CliResult};
use tracing::{debug, info};

/// Signer plus live chain connection for one command
pub struct Session {
    signer: PrivateKeySigner,
    provider: DynProvider,
    chain_id: u64,
}

impl Session {
    /// Build the signer, connect it to the RPC endpoint and read the chain id
    /// from the network. Every call is a round trip.
    pub async fn initialize(settings: &Settings) -> CliResult<Self> {
        let signer = build_signer(&settings.credential)?;
        let provider = ProviderBuilder::new()
            .wallet(signer.clone())
            .connect_http(settings.rpc_url.clone())
            .erased();

        let chain_id = provider.get_chain_id().await.map_err(|e| {
            CliError::Chain(format!("failed to reach RPC {}: {}", settings.rpc_url, e))
        })?;

        info!("🔑 Signer {} on chain {}", signer.address(), chain_id);
        Ok(Self {
            signer,
            provider,
            chain_id,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Checksummed address as providers expect it
    pub fn consumer_address(&self) -> String {
        self.signer.address().to_checksum(None)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Personal-sign the keccak-256 of `message`, 0x-prefixed hex
    pub async fn sign_request(&self, message: &str) -> CliResult<String> {
        debug!("Signing provider request: {}", message);
        let digest = keccak256(message.as_bytes());
        let signature = self
            .signer
            .sign_message(digest.as_slice())
            .await
            .map_err(CliError::chain)?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}

pub fn build_signer(credential: &Credential) -> CliResult<PrivateKeySigner> {
    match credential {
        Credential::PrivateKey(key) => key
            .parse::<PrivateKeySigner>()
            .map_err(|e| CliError::Configuration(format!("PRIVATE_KEY is not a valid key: {}", e))),
        Credential::Mnemonic(phrase) => MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .index(0u32)
            .and_then(|builder| builder.build())
            .map_err(|e| CliError::Configuration(format!("MNEMONIC is not usable: {}", e))),
    }
}
