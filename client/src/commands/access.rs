use super::CommandContext;
use crate::chain;
use crate::node::{save_response, DownloadQuery};
use crate::registry::BoundArgs;
use ocean_cli_shared::{CliError, CliResult, Ddo, ProviderFees};
use std::path::Path;
use tracing::{info, warn};

/// Datatokens consumed per order (display units)
const ONE_DATATOKEN: &str = "1";

/// Buy one use of `service_id` on `ddo`; returns the order transaction hash.
///
/// Orders consume one datatoken. When the signer holds none it tries to mint
/// one, which only works for the datatoken's minters (usually the publisher).
pub async fn order_service(
    ctx: &CommandContext<'_>,
    ddo: &Ddo,
    service_id: &str,
    datatoken: &str,
    fees: &ProviderFees,
) -> CliResult<String> {
    let datatoken = chain::parse_address(datatoken, "datatoken")?;
    let service_index = ddo.service_index(service_id).unwrap_or(0);
    let provider = ctx.session.provider();
    let consumer = ctx.session.address();

    let one = chain::to_base_units(ONE_DATATOKEN, 18)?;
    if chain::balance_of(provider, datatoken, consumer).await? < one {
        warn!("No datatoken {} in wallet, trying to mint one", datatoken);
        chain::mint(provider, datatoken, consumer, one).await?;
    }

    let tx = chain::start_order(provider, datatoken, consumer, service_index, fees).await?;
    Ok(tx.to_string())
}

pub async fn download(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let did = args.require("did")?;
    let folder = args.get("folder").unwrap_or(".");

    let ddo = ctx.node.resolve_ddo(did).await?;
    let service = ddo
        .service_of_type("access")
        .ok_or_else(|| CliError::InvalidArgument(format!("{} has no access service", did)))?;
    let consumer = ctx.session.consumer_address();

    let initialized = ctx.node.initialize_access(did, &service.id, &consumer).await?;
    let transfer_tx_id = match initialized.valid_order {
        Some(order) => {
            info!("✓ Reusing order {}", order);
            order
        }
        None => {
            order_service(ctx, &ddo, &service.id, &initialized.datatoken, &initialized.provider_fee)
                .await?
        }
    };

    let (nonce, signature) = ctx.sign_with_nonce(did).await?;
    let response = ctx
        .node
        .download(&DownloadQuery {
            did,
            service_id: &service.id,
            transfer_tx_id: &transfer_tx_id,
            consumer_address: &consumer,
            nonce: &nonce,
            signature: &signature,
        })
        .await?;

    let path = save_response(response, Path::new(folder), "file0").await?;
    println!("File downloaded to {}", path.display());
    Ok(())
}
