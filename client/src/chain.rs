//! Contract bindings and the handful of transactions the CLI sends.

use alloy::network::Ethereum;
use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder};
use alloy::sol;
use ocean_cli_shared::{CliError, CliResult, ProviderFees};
use tracing::info;

sol! {
    struct NftCreateData {
        string name;
        string symbol;
        uint256 templateIndex;
        string tokenURI;
        bool transferable;
        address owner;
    }

    struct ErcCreateData {
        uint256 templateIndex;
        string[] strings;
        address[] addresses;
        uint256[] uints;
        bytes[] bytess;
    }

    struct MetaDataProof {
        address validatorAddress;
        uint8 v;
        bytes32 r;
        bytes32 s;
    }

    struct ProviderFee {
        address providerFeeAddress;
        address providerFeeToken;
        uint256 providerFeeAmount;
        uint8 v;
        bytes32 r;
        bytes32 s;
        uint256 validUntil;
        bytes providerData;
    }

    struct ConsumeMarketFee {
        address consumeMarketFeeAddress;
        address consumeMarketFeeToken;
        uint256 consumeMarketFeeAmount;
    }

    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function mint(address account, uint256 value) external;
    }

    #[sol(rpc)]
    interface IEscrow {
        function deposit(address token, uint256 amount) external;
        function withdraw(address[] calldata tokens, uint256[] calldata amounts) external;
        function authorize(address token, address payee, uint256 maxLockedAmount, uint256 maxLockSeconds, uint256 maxLockCounts) external;
        function getUserFunds(address payer, address token) external view returns (uint256 available, uint256 locked);
    }

    #[sol(rpc)]
    interface IERC721Factory {
        event NFTCreated(address indexed newTokenAddress, address indexed templateAddress, string tokenName, address admin, string symbol, string tokenURI, bool transferable, address indexed creator);
        event TokenCreated(address indexed newTokenAddress, address indexed templateAddress, string name);

        function createNftWithErc20(NftCreateData calldata _NftCreateData, ErcCreateData calldata _ErcCreateData) external returns (address erc721Address, address erc20Address);
    }

    #[sol(rpc)]
    interface IERC721Template {
        function setMetaData(uint8 _metaDataState, string calldata _metaDataDecryptorUrl, string calldata _metaDataDecryptorAddress, bytes calldata flags, bytes calldata data, bytes32 _metaDataHash, MetaDataProof[] memory _metadataProofs) external;
    }

    #[sol(rpc)]
    interface IDatatoken {
        function startOrder(address consumer, uint256 serviceIndex, ProviderFee calldata _providerFee, ConsumeMarketFee calldata _consumeMarketFee) external;
    }
}

/// Datatoken cap used for newly published assets (display units)
const DATATOKEN_CAP: &str = "100000";
const NFT_TOKEN_URI: &str = "https://oceanprotocol.com/nft/";

pub fn parse_address(value: &str, what: &str) -> CliResult<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| {
            CliError::InvalidArgument(format!("{} is not an address ({}): {}", what, value, e))
        })
}

fn parse_b256(value: &str, what: &str) -> CliResult<B256> {
    value
        .parse::<B256>()
        .map_err(|e| {
            CliError::InvalidArgument(format!("{} is not a 32-byte hex value: {}", what, e))
        })
}

fn parse_bytes(value: &str, what: &str) -> CliResult<Bytes> {
    value
        .parse::<Bytes>()
        .map_err(|e| CliError::InvalidArgument(format!("{} is not hex bytes: {}", what, e)))
}

pub fn parse_u256(value: &str, what: &str) -> CliResult<U256> {
    value
        .trim()
        .parse::<U256>()
        .map_err(|e| {
            CliError::InvalidArgument(format!("{} is not an integer ({}): {}", what, value, e))
        })
}

/// "1.5" with 18 decimals -> 1500000000000000000; only strictly positive amounts
pub fn to_base_units(amount: &str, decimals: u8) -> CliResult<U256> {
    let parsed = parse_units(amount.trim(), decimals)
        .map_err(|e| CliError::InvalidArgument(format!("invalid amount '{}': {}", amount, e)))?;
    match parsed {
        ParseUnits::U256(value) if !value.is_zero() => Ok(value),
        ParseUnits::U256(_) => Err(CliError::InvalidArgument(format!(
            "amount must be greater than zero, got '{}'",
            amount
        ))),
        ParseUnits::I256(_) => Err(CliError::InvalidArgument(format!(
            "amount must not be negative, got '{}'",
            amount
        ))),
    }
}

/// Base units -> human readable amount without trailing zeros
pub fn to_display_units(amount: U256, decimals: u8) -> CliResult<String> {
    let formatted = format_units(amount, decimals).map_err(CliError::chain)?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    Ok(trimmed.to_string())
}

async fn confirm(pending: PendingTransactionBuilder<Ethereum>, what: &str) -> CliResult<B256> {
    let receipt = pending.get_receipt().await.map_err(CliError::chain)?;
    if !receipt.status() {
        return Err(CliError::Chain(format!(
            "{} transaction {} reverted",
            what, receipt.transaction_hash
        )));
    }
    info!("✓ {} confirmed in tx {}", what, receipt.transaction_hash);
    Ok(receipt.transaction_hash)
}

pub async fn token_decimals(provider: &DynProvider, token: Address) -> CliResult<u8> {
    IERC20::new(token, provider.clone())
        .decimals()
        .call()
        .await
        .map_err(CliError::chain)
}

pub async fn balance_of(provider: &DynProvider, token: Address, owner: Address) -> CliResult<U256> {
    IERC20::new(token, provider.clone())
        .balanceOf(owner)
        .call()
        .await
        .map_err(CliError::chain)
}

pub async fn approve(
    provider: &DynProvider,
    token: Address,
    spender: Address,
    amount: U256,
) -> CliResult<B256> {
    let pending = IERC20::new(token, provider.clone())
        .approve(spender, amount)
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Approve").await
}

pub async fn mint(
    provider: &DynProvider,
    token: Address,
    to: Address,
    amount: U256,
) -> CliResult<B256> {
    let pending = IERC20::new(token, provider.clone())
        .mint(to, amount)
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Mint").await
}

pub async fn escrow_funds(
    provider: &DynProvider,
    escrow: Address,
    payer: Address,
    token: Address,
) -> CliResult<(U256, U256)> {
    let funds = IEscrow::new(escrow, provider.clone())
        .getUserFunds(payer, token)
        .call()
        .await
        .map_err(CliError::chain)?;
    Ok((funds.available, funds.locked))
}

pub async fn escrow_deposit(
    provider: &DynProvider,
    escrow: Address,
    token: Address,
    amount: U256,
) -> CliResult<B256> {
    let pending = IEscrow::new(escrow, provider.clone())
        .deposit(token, amount)
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Escrow deposit").await
}

pub async fn escrow_withdraw(
    provider: &DynProvider,
    escrow: Address,
    token: Address,
    amount: U256,
) -> CliResult<B256> {
    let pending = IEscrow::new(escrow, provider.clone())
        .withdraw(vec![token], vec![amount])
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Escrow withdraw").await
}

/// Limits a payee may lock from the payer's escrow balance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscrowAuthorization {
    pub payee: Address,
    pub max_locked_amount: U256,
    pub max_lock_seconds: U256,
    pub max_lock_counts: U256,
}

pub async fn escrow_authorize(
    provider: &DynProvider,
    escrow: Address,
    token: Address,
    auth: EscrowAuthorization,
) -> CliResult<B256> {
    let pending = IEscrow::new(escrow, provider.clone())
        .authorize(
            token,
            auth.payee,
            auth.max_locked_amount,
            auth.max_lock_seconds,
            auth.max_lock_counts,
        )
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Escrow authorization").await
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatedAsset {
    pub nft: Address,
    pub datatoken: Address,
}

/// Deploy an NFT with one datatoken through the factory
pub async fn create_nft_with_datatoken(
    provider: &DynProvider,
    factory: Address,
    owner: Address,
    name: &str,
) -> CliResult<CreatedAsset> {
    let nft_data = NftCreateData {
        name: name.to_string(),
        symbol: "OCEAN-NFT".to_string(),
        templateIndex: U256::from(1),
        tokenURI: NFT_TOKEN_URI.to_string(),
        transferable: true,
        owner,
    };
    let datatoken_data = ErcCreateData {
        templateIndex: U256::from(1),
        strings: vec![format!("{} Datatoken", name), "DT1".to_string()],
        addresses: vec![owner, owner, Address::ZERO, Address::ZERO],
        uints: vec![to_base_units(DATATOKEN_CAP, 18)?, U256::ZERO],
        bytess: vec![],
    };

    let pending = IERC721Factory::new(factory, provider.clone())
        .createNftWithErc20(nft_data, datatoken_data)
        .send()
        .await
        .map_err(CliError::chain)?;
    let receipt = pending.get_receipt().await.map_err(CliError::chain)?;
    if !receipt.status() {
        return Err(CliError::Chain(format!(
            "NFT creation transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    let logs = receipt.inner.logs();
    let nft = logs
        .iter()
        .find_map(|log| log.log_decode::<IERC721Factory::NFTCreated>().ok())
        .map(|event| event.inner.data.newTokenAddress)
        .ok_or_else(|| CliError::Chain("NFTCreated event missing from receipt".to_string()))?;
    let datatoken = logs
        .iter()
        .find_map(|log| log.log_decode::<IERC721Factory::TokenCreated>().ok())
        .map(|event| event.inner.data.newTokenAddress)
        .ok_or_else(|| CliError::Chain("TokenCreated event missing from receipt".to_string()))?;

    info!("✓ NFT {} with datatoken {} created", nft, datatoken);
    Ok(CreatedAsset { nft, datatoken })
}

/// On-chain metadata record of an NFT
#[derive(Debug, Clone)]
pub struct MetadataUpdate {
    pub decryptor_url: String,
    pub decryptor_address: String,
    /// 0x00 plain, 0x02 encrypted by the provider
    pub flags: u8,
    pub data: Bytes,
    pub hash: B256,
}

pub async fn set_metadata(
    provider: &DynProvider,
    nft: Address,
    update: MetadataUpdate,
) -> CliResult<B256> {
    let pending = IERC721Template::new(nft, provider.clone())
        .setMetaData(
            0,
            update.decryptor_url,
            update.decryptor_address,
            Bytes::from(vec![update.flags]),
            update.data,
            update.hash,
            vec![],
        )
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Set metadata").await
}

/// Pay for one use of a service; pays the provider fee first when non-zero
pub async fn start_order(
    provider: &DynProvider,
    datatoken: Address,
    consumer: Address,
    service_index: usize,
    fees: &ProviderFees,
) -> CliResult<B256> {
    let fee = ProviderFee {
        providerFeeAddress: parse_address(&fees.provider_fee_address, "providerFeeAddress")?,
        providerFeeToken: parse_address(&fees.provider_fee_token, "providerFeeToken")?,
        providerFeeAmount: parse_u256(&fees.provider_fee_amount, "providerFeeAmount")?,
        v: fees.v,
        r: parse_b256(&fees.r, "providerFee.r")?,
        s: parse_b256(&fees.s, "providerFee.s")?,
        validUntil: parse_u256(&fees.valid_until, "providerFee.validUntil")?,
        providerData: parse_bytes(&fees.provider_data, "providerData")?,
    };

    if !fee.providerFeeAmount.is_zero() {
        approve(provider, fee.providerFeeToken, datatoken, fee.providerFeeAmount).await?;
    }

    let market_fee = ConsumeMarketFee {
        consumeMarketFeeAddress: Address::ZERO,
        consumeMarketFeeToken: Address::ZERO,
        consumeMarketFeeAmount: U256::ZERO,
    };
    let pending = IDatatoken::new(datatoken, provider.clone())
        .startOrder(consumer, U256::from(service_index as u64), fee, market_fee)
        .send()
        .await
        .map_err(CliError::chain)?;
    confirm(pending, "Order").await
}
