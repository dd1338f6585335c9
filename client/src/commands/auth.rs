use super::CommandContext;
use crate::registry::BoundArgs;
use ocean_cli_shared::{CliError, CliResult};
use tracing::info;

pub async fn generate_auth_token(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let valid_until = args
        .get("validUntil")
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                CliError::InvalidArgument("validUntil must be a unix timestamp".to_string())
            })
        })
        .transpose()?;
    let address = ctx.session.consumer_address();

    let (nonce, signature) = ctx.sign_with_nonce(&address).await?;
    let token = ctx
        .node
        .generate_auth_token(&address, &nonce, &signature, valid_until)
        .await?;
    info!("✓ Auth token issued for {}", address);
    println!("Auth token: {}", token);
    Ok(())
}

pub async fn invalidate_auth_token(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let token = args.require("token")?;
    let address = ctx.session.consumer_address();

    let (nonce, signature) = ctx.sign_with_nonce(&address).await?;
    ctx.node
        .invalidate_auth_token(&address, &nonce, &signature, token)
        .await?;
    println!("Auth token invalidated");
    Ok(())
}
