use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Decentralized data object a DID resolves to.
///
/// Only the fields the CLI reads or rewrites are typed; everything else is
/// carried in `extra` so a re-published document keeps it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ddo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub nft_address: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ddo {
    pub fn is_algorithm(&self) -> bool {
        self.metadata.asset_type == "algorithm"
    }

    /// First service of the given type ("access" or "compute")
    pub fn service_of_type(&self, service_type: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.service_type == service_type)
    }

    pub fn service_index(&self, service_id: &str) -> Option<usize> {
        self.services.iter().position(|s| s.id == service_id)
    }

    /// Service used when this asset takes part in a compute job
    pub fn compute_service(&self) -> Option<&Service> {
        self.service_of_type("compute")
            .or_else(|| self.services.first())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "type")]
    pub asset_type: String, // "dataset" or "algorithm"
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<AlgorithmMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<AlgorithmContainer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmContainer {
    pub entrypoint: String,
    pub image: String,
    pub tag: String,
    #[serde(default)]
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub files: Value,
    #[serde(default)]
    pub datatoken_address: String,
    #[serde(default)]
    pub service_endpoint: String,
    #[serde(default)]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Compute section of a dataset service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputeOptions {
    #[serde(default)]
    pub allow_raw_algorithm: bool,
    #[serde(default)]
    pub allow_network_access: bool,
    #[serde(default)]
    pub publisher_trusted_algorithm_publishers: Vec<String>,
    #[serde(default)]
    pub publisher_trusted_algorithms: Vec<TrustedAlgorithm>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrustedAlgorithm {
    pub did: String,
    pub files_checksum: String,
    pub container_section_checksum: String,
}

/// Execution slot advertised by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeEnvironment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_job_duration: Option<u64>,
    #[serde(default)]
    pub resources: Vec<EnvironmentResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentResource {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Requested amount of one environment resource ("cpu", "ram", "disk", ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputeResourceRequest {
    pub id: String,
    pub amount: u64,
}

/// Dataset or algorithm reference inside a compute request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAsset {
    pub document_id: String,
    pub service_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_tx_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputePayment {
    pub chain_id: u64,
    pub token: String,
    pub resources: Vec<ComputeResourceRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeComputeRequest {
    pub datasets: Vec<ComputeAsset>,
    pub algorithm: ComputeAsset,
    pub environment: String,
    pub payment: ComputePayment,
    pub max_job_duration: u64,
    pub consumer_address: String,
}

/// Fee quote a provider attaches to an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFees {
    pub provider_fee_address: String,
    pub provider_fee_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub provider_fee_amount: String,
    pub v: u8,
    pub r: String,
    pub s: String,
    pub provider_data: String,
    #[serde(deserialize_with = "string_or_number")]
    pub valid_until: String,
}

/// Per-asset part of an initialize-compute answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializedAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatoken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_fee: Option<ProviderFees>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_order: Option<String>,
}

impl InitializedAsset {
    /// True when a datatoken order has to be placed before the job starts
    pub fn needs_order(&self) -> bool {
        self.valid_order.is_none() && self.provider_fee.is_some() && self.datatoken.is_some()
    }
}

/// Escrow price quote for a paid compute job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuote {
    pub escrow_address: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub chain_id: u64,
    pub token: String,
    /// Base units of `token`
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default)]
    pub min_lock_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeComputeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<InitializedAsset>,
    #[serde(default)]
    pub datasets: Vec<InitializedAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentQuote>,
}

/// Body of both the paid and the free start endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartComputeRequest {
    pub datasets: Vec<ComputeAsset>,
    pub algorithm: ComputeAsset,
    pub environment: String,
    pub consumer_address: String,
    pub nonce: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<ComputePayment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_job_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ComputeResourceRequest>>,
    /// Serialized initialize answer the payment was confirmed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_response: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopComputeRequest {
    pub consumer_address: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    pub nonce: String,
    pub signature: String,
}

/// Job record as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeJob {
    pub job_id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    #[serde(default)]
    pub results: Vec<ComputeResultFile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResultFile {
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(rename = "type", default)]
    pub result_type: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// Answer of the access-service initialize endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessInitializeResponse {
    pub datatoken: String,
    pub provider_fee: ProviderFees,
    #[serde(default)]
    pub valid_order: Option<String>,
}

/// Node root document; only the signer addresses are used
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub provider_address: Option<String>,
    #[serde(default)]
    pub provider_addresses: BTreeMap<String, String>,
}

impl NodeInfo {
    pub fn provider_address_for(&self, chain_id: u64) -> Option<&str> {
        self.provider_addresses
            .get(&chain_id.to_string())
            .or(self.provider_address.as_ref())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub token: String,
}

/// Providers are inconsistent about quoting big integers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
