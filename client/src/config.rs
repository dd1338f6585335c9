use ocean_cli_shared::{CliError, CliResult};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Signer secret; never printed
#[derive(Clone, PartialEq)]
pub enum Credential {
    PrivateKey(String),
    Mnemonic(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey(_) => write!(f, "PrivateKey(<redacted>)"),
            Credential::Mnemonic(_) => write!(f, "Mnemonic(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub credential: Credential,
    pub rpc_url: Url,
    pub node_url: Url,
    pub address_file: Option<PathBuf>,
    pub avoid_loop_run: bool,
}

/// Environment as read by the `config` crate (keys are lower-cased)
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    private_key: Option<String>,
    mnemonic: Option<String>,
    rpc: Option<String>,
    node_url: Option<String>,
    address_file: Option<PathBuf>,
    avoid_loop_run: Option<bool>,
}

impl Settings {
    pub fn from_env() -> CliResult<Self> {
        Self::from_source(None)
    }

    /// Load from the given variables instead of the process environment
    pub fn from_source(source: Option<config::Map<String, String>>) -> CliResult<Self> {
        let raw: RawSettings = config::Config::builder()
            .add_source(config::Environment::default().source(source))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CliError::Configuration(e.to_string()))?;
        raw.validate()
    }
}

impl RawSettings {
    fn validate(self) -> CliResult<Settings> {
        let credential = match (non_empty(self.private_key), non_empty(self.mnemonic)) {
            (Some(key), _) => Credential::PrivateKey(key),
            (None, Some(phrase)) => Credential::Mnemonic(phrase),
            (None, None) => {
                return Err(CliError::Configuration(
                    "PRIVATE_KEY or MNEMONIC environment variable must be set".to_string(),
                ))
            }
        };

        Ok(Settings {
            credential,
            rpc_url: required_url("RPC", self.rpc)?,
            node_url: required_url("NODE_URL", self.node_url)?,
            address_file: self.address_file.filter(|p| !p.as_os_str().is_empty()),
            avoid_loop_run: self.avoid_loop_run.unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_url(var: &str, value: Option<String>) -> CliResult<Url> {
    let value = non_empty(value).ok_or_else(|| {
        CliError::Configuration(format!("{} environment variable must be set", var))
    })?;
    Url::parse(&value)
        .map_err(|e| {
            CliError::Configuration(format!("{} is not a valid URL ({}): {}", var, value, e))
        })
}
