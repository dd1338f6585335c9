//! Asset publishing, metadata edits and the trusted-algorithm list.

use super::{bool_param, print_json, CommandContext};
use crate::chain::{self, CreatedAsset, MetadataUpdate};
use crate::node::NodeClient;
use crate::registry::BoundArgs;
use alloy::hex;
use alloy::primitives::{Address, Bytes, B256};
use chrono::{SecondsFormat, Utc};
use ocean_cli_shared::{
    AlgorithmContainer, CliError, CliResult, ComputeOptions, Ddo, FileInfo, TrustedAlgorithm,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Metadata flag telling the decryptor the payload was encrypted by it
const FLAG_ENCRYPTED: u8 = 0x02;
const FLAG_PLAIN: u8 = 0x00;

pub async fn get_ddo(node: &NodeClient, args: &BoundArgs) -> CliResult<()> {
    let did = args.require("did")?;
    let ddo = node.resolve_ddo(did).await?;
    print_json(&ddo)
}

/// `did:op:` + sha256(checksummed NFT address + chain id)
pub fn derive_did(nft: Address, chain_id: u64) -> String {
    let seed = format!("{}{}", nft.to_checksum(None), chain_id);
    format!("did:op:{}", hex::encode(Sha256::digest(seed.as_bytes())))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn read_ddo_file(path: &str) -> CliResult<Ddo> {
    let raw = tokio::fs::read_to_string(Path::new(path)).await.map_err(|e| {
        CliError::InvalidArgument(format!("cannot read metadata file {}: {}", path, e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        CliError::InvalidArgument(format!("metadata file {} is not a valid DDO: {}", path, e))
    })
}

pub async fn publish(ctx: &CommandContext<'_>, args: &BoundArgs, algorithm: bool) -> CliResult<()> {
    let path = args.require("metadataFile")?;
    let encrypt = bool_param(args, "encrypt", true)?;
    let mut ddo = read_ddo_file(path).await?;

    if algorithm && !ddo.is_algorithm() {
        return Err(CliError::InvalidArgument(format!(
            "{} has metadata type '{}', publishAlgo needs 'algorithm'",
            path, ddo.metadata.asset_type
        )));
    }
    if ddo.services.is_empty() {
        return Err(CliError::InvalidArgument(format!("{} declares no services", path)));
    }

    let chain_id = ctx.session.chain_id();
    let factory = ctx.contracts()?.nft_factory()?;
    info!("📦 Publishing '{}' on chain {}", ddo.metadata.name, chain_id);
    let created = chain::create_nft_with_datatoken(
        ctx.session.provider(),
        factory,
        ctx.session.address(),
        &ddo.metadata.name,
    )
    .await?;

    let did = derive_did(created.nft, chain_id);
    ddo.id = did.clone();
    ddo.chain_id = chain_id;
    ddo.nft_address = created.nft.to_checksum(None);
    let timestamp = now();
    ddo.metadata.created.get_or_insert_with(|| timestamp.clone());
    ddo.metadata.updated = Some(timestamp);

    let endpoint = ctx.node.base_url().as_str().trim_end_matches('/').to_string();
    for service in ddo.services.iter_mut() {
        service.datatoken_address = created.datatoken.to_checksum(None);
        if service.service_endpoint.is_empty() {
            service.service_endpoint = endpoint.clone();
        }
        service.files = encrypt_files(ctx, &created, &service.id, &service.files).await?;
    }

    update_metadata(ctx, created.nft, &ddo, encrypt).await?;
    println!("Asset published. DID: {}", did);
    Ok(())
}

/// Plain file lists are handed to the provider for encryption; strings are
/// taken as already encrypted.
async fn encrypt_files(
    ctx: &CommandContext<'_>,
    created: &CreatedAsset,
    service_id: &str,
    files: &Value,
) -> CliResult<Value> {
    match files {
        Value::String(encrypted) if !encrypted.is_empty() => Ok(files.clone()),
        Value::Null | Value::String(_) => Err(CliError::InvalidArgument(format!(
            "service {} has no files",
            service_id
        ))),
        plain => {
            let mut document = plain.clone();
            if let Value::Object(map) = &mut document {
                map.insert(
                    "datatokenAddress".to_string(),
                    Value::String(created.datatoken.to_checksum(None)),
                );
                map.insert(
                    "nftAddress".to_string(),
                    Value::String(created.nft.to_checksum(None)),
                );
            }
            let encrypted = ctx
                .node
                .encrypt(ctx.session.chain_id(), serde_json::to_vec(&document)?)
                .await?;
            Ok(Value::String(encrypted))
        }
    }
}

/// Write `ddo` as the NFT's metadata, encrypted by the node when asked
async fn update_metadata(
    ctx: &CommandContext<'_>,
    nft: Address,
    ddo: &Ddo,
    encrypt: bool,
) -> CliResult<()> {
    let document = serde_json::to_vec(ddo)?;
    let hash = B256::from_slice(Sha256::digest(&document).as_slice());
    let chain_id = ctx.session.chain_id();

    let info = ctx.node.node_info().await?;
    let decryptor_address = info.provider_address_for(chain_id).unwrap_or_default().to_string();

    let (flags, data) = if encrypt {
        if decryptor_address.is_empty() {
            return Err(CliError::RemoteService {
                status: 500,
                message: format!("node reports no provider address for chain {}", chain_id),
            });
        }
        let encrypted = ctx.node.encrypt(chain_id, document).await?;
        let data = encrypted.parse::<Bytes>().map_err(|e| CliError::RemoteService {
            status: 500,
            message: format!("node returned malformed ciphertext: {}", e),
        })?;
        (FLAG_ENCRYPTED, data)
    } else {
        (FLAG_PLAIN, Bytes::from(document))
    };

    let update = MetadataUpdate {
        decryptor_url: ctx.node.base_url().as_str().trim_end_matches('/').to_string(),
        decryptor_address,
        flags,
        data,
        hash,
    };
    chain::set_metadata(ctx.session.provider(), nft, update).await?;
    Ok(())
}

pub async fn edit_asset(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let did = args.require("datasetDid")?;
    let path = args.require("metadataFile")?;
    let encrypt = bool_param(args, "encrypt", true)?;

    let current = ctx.node.resolve_ddo(did).await?;
    let mut updated = read_ddo_file(path).await?;
    updated.id = current.id.clone();
    updated.chain_id = current.chain_id;
    updated.nft_address = current.nft_address.clone();
    if updated.services.is_empty() {
        updated.services = current.services.clone();
    }
    updated.metadata.created = current.metadata.created.clone();
    updated.metadata.updated = Some(now());

    let nft = chain::parse_address(&current.nft_address, "nftAddress")?;
    update_metadata(ctx, nft, &updated, encrypt).await?;
    println!("Asset updated. DID: {}", current.id);
    Ok(())
}

/// sha256 over the concatenated file checksums reported by the provider
pub fn files_checksum(files: &[FileInfo]) -> String {
    let joined: String = files
        .iter()
        .filter_map(|file| file.checksum.as_deref())
        .collect();
    hex::encode(Sha256::digest(joined.as_bytes()))
}

pub fn container_checksum(container: &AlgorithmContainer) -> String {
    let seed = format!("{}{}", container.entrypoint, container.checksum);
    hex::encode(Sha256::digest(seed.as_bytes()))
}

fn compute_options_mut(ddo: &mut Ddo) -> CliResult<&mut ComputeOptions> {
    let did = ddo.id.clone();
    let service = ddo
        .services
        .iter_mut()
        .find(|s| s.service_type == "compute")
        .ok_or_else(|| CliError::InvalidArgument(format!("{} has no compute service", did)))?;
    Ok(service.compute.get_or_insert_with(ComputeOptions::default))
}

/// Add or refresh `entry`; returns false when the list already held it as is
pub fn trust_algorithm(ddo: &mut Ddo, entry: TrustedAlgorithm) -> CliResult<bool> {
    let options = compute_options_mut(ddo)?;
    let trusted = &mut options.publisher_trusted_algorithms;
    match trusted.iter_mut().find(|t| t.did == entry.did) {
        Some(existing) if *existing == entry => Ok(false),
        Some(existing) => {
            *existing = entry;
            Ok(true)
        }
        None => {
            trusted.push(entry);
            Ok(true)
        }
    }
}

/// Remove `algo_did`; returns false when it was not trusted
pub fn distrust_algorithm(ddo: &mut Ddo, algo_did: &str) -> CliResult<bool> {
    let options = compute_options_mut(ddo)?;
    let before = options.publisher_trusted_algorithms.len();
    options.publisher_trusted_algorithms.retain(|t| t.did != algo_did);
    Ok(options.publisher_trusted_algorithms.len() != before)
}

pub async fn allow_algo(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let dataset_did = args.require("datasetDid")?;
    let algo_did = args.require("algoDid")?;
    let encrypt = bool_param(args, "encrypt", true)?;

    let mut dataset = ctx.node.resolve_ddo(dataset_did).await?;
    let algorithm = ctx.node.resolve_ddo(algo_did).await?;
    if !algorithm.is_algorithm() {
        return Err(CliError::InvalidArgument(format!("{} is not an algorithm", algo_did)));
    }
    let container = algorithm
        .metadata
        .algorithm
        .as_ref()
        .and_then(|a| a.container.as_ref())
        .ok_or_else(|| {
            CliError::InvalidArgument(format!("{} has no container definition", algo_did))
        })?;
    let service = algorithm
        .compute_service()
        .ok_or_else(|| CliError::InvalidArgument(format!("{} has no services", algo_did)))?;

    let files = ctx.node.file_info(algo_did, &service.id).await?;
    let entry = TrustedAlgorithm {
        did: algo_did.to_string(),
        files_checksum: files_checksum(&files),
        container_section_checksum: container_checksum(container),
    };

    if !trust_algorithm(&mut dataset, entry)? {
        info!("{} already trusted by {}", algo_did, dataset_did);
        return Ok(());
    }
    dataset.metadata.updated = Some(now());
    let nft = chain::parse_address(&dataset.nft_address, "nftAddress")?;
    update_metadata(ctx, nft, &dataset, encrypt).await?;
    println!("Algorithm {} allowed on {}", algo_did, dataset_did);
    Ok(())
}

pub async fn disallow_algo(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let dataset_did = args.require("datasetDid")?;
    let algo_did = args.require("algoDid")?;
    let encrypt = bool_param(args, "encrypt", true)?;

    let mut dataset = ctx.node.resolve_ddo(dataset_did).await?;
    if !distrust_algorithm(&mut dataset, algo_did)? {
        info!("{} is not trusted by {}, nothing to do", algo_did, dataset_did);
        return Ok(());
    }
    dataset.metadata.updated = Some(now());
    let nft = chain::parse_address(&dataset.nft_address, "nftAddress")?;
    update_metadata(ctx, nft, &dataset, encrypt).await?;
    println!("Algorithm {} removed from {}", algo_did, dataset_did);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Ddo {
        serde_json::from_value(serde_json::json!({
            "id": "did:op:aaa",
            "chainId": 8996,
            "nftAddress": "0x1111111111111111111111111111111111111111",
            "metadata": {"type": "dataset", "name": "weather"},
            "services": [{"id": "svc-1", "type": "compute", "files": "0xdead"}]
        }))
        .unwrap()
    }

    fn entry(did: &str, checksum: &str) -> TrustedAlgorithm {
        TrustedAlgorithm {
            did: did.to_string(),
            files_checksum: checksum.to_string(),
            container_section_checksum: "c".to_string(),
        }
    }

    #[test]
    fn test_derive_did_is_deterministic() {
        let nft: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let did = derive_did(nft, 8996);
        assert_eq!(did, derive_did(nft, 8996));
        assert_ne!(did, derive_did(nft, 1));
        let suffix = did.strip_prefix("did:op:").unwrap();
        assert_eq!(suffix.len(), 64);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksums() {
        let raw = r#"[{"checksum":"ab"},{"valid":true},{"checksum":"cd"}]"#;
        let files: Vec<FileInfo> = serde_json::from_str(raw).unwrap();
        let expected = hex::encode(Sha256::digest(b"abcd"));
        assert_eq!(files_checksum(&files), expected);

        let container = AlgorithmContainer {
            entrypoint: "python $ALGO".into(),
            image: "python".into(),
            tag: "3.11".into(),
            checksum: "sha256:00".into(),
        };
        assert_eq!(
            container_checksum(&container),
            hex::encode(Sha256::digest(b"python $ALGOsha256:00"))
        );
    }

    #[test]
    fn test_trust_and_distrust() {
        let mut ddo = dataset();
        assert!(trust_algorithm(&mut ddo, entry("did:op:algo", "x")).unwrap());
        assert!(!trust_algorithm(&mut ddo, entry("did:op:algo", "x")).unwrap());
        assert!(trust_algorithm(&mut ddo, entry("did:op:algo", "y")).unwrap());

        let trusted = &ddo.services[0].compute.as_ref().unwrap().publisher_trusted_algorithms;
        assert_eq!(trusted.len(), 1);
        assert_eq!(trusted[0].files_checksum, "y");

        assert!(distrust_algorithm(&mut ddo, "did:op:algo").unwrap());
        assert!(!distrust_algorithm(&mut ddo, "did:op:algo").unwrap());
    }

    #[test]
    fn test_trust_needs_compute_service() {
        let mut ddo = dataset();
        ddo.services[0].service_type = "access".into();
        assert!(matches!(
            trust_algorithm(&mut ddo, entry("did:op:algo", "x")),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
