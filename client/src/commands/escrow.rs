use super::CommandContext;
use crate::chain::{self, EscrowAuthorization};
use crate::registry::BoundArgs;
use alloy::primitives::Address;
use ocean_cli_shared::{CliError, CliResult};
use tracing::info;

/// OCEAN handed out by `mintOcean` (display units)
const MINT_AMOUNT: &str = "1000";

/// Token address from `name` plus its on-chain decimals
async fn token_param(
    ctx: &CommandContext<'_>,
    args: &BoundArgs,
    name: &str,
) -> CliResult<(Address, u8)> {
    let token = chain::parse_address(args.require(name)?, name)?;
    let decimals = chain::token_decimals(ctx.session.provider(), token).await?;
    Ok((token, decimals))
}

pub async fn mint_ocean(ctx: &CommandContext<'_>) -> CliResult<()> {
    let ocean = ctx.contracts()?.ocean()?;
    let provider = ctx.session.provider();
    let decimals = chain::token_decimals(provider, ocean).await?;
    let amount = chain::to_base_units(MINT_AMOUNT, decimals)?;

    chain::mint(provider, ocean, ctx.session.address(), amount).await?;
    println!("Minted {} OCEAN to {}", MINT_AMOUNT, ctx.session.consumer_address());
    Ok(())
}

pub async fn deposit_escrow(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let (token, decimals) = token_param(ctx, args, "token").await?;
    let amount_text = args.require("amount")?;
    let amount = chain::to_base_units(amount_text, decimals)?;
    let escrow = ctx.contracts()?.escrow()?;
    let provider = ctx.session.provider();

    info!("💰 Depositing {} of {} into escrow {}", amount_text, token, escrow);
    chain::approve(provider, token, escrow, amount).await?;
    chain::escrow_deposit(provider, escrow, token, amount).await?;
    println!("Deposited {} of token {} into escrow", amount_text, token);
    Ok(())
}

pub async fn authorize_escrow(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let (token, decimals) = token_param(ctx, args, "token").await?;
    let payee = chain::parse_address(args.require("payee")?, "payee")?;
    let max_locked = args.require("maxLockedAmount")?;
    let authorization = EscrowAuthorization {
        payee,
        max_locked_amount: chain::to_base_units(max_locked, decimals)?,
        max_lock_seconds: chain::parse_u256(args.require("maxLockSeconds")?, "maxLockSeconds")?,
        max_lock_counts: chain::parse_u256(args.require("maxLockCounts")?, "maxLockCounts")?,
    };
    let escrow = ctx.contracts()?.escrow()?;

    chain::escrow_authorize(ctx.session.provider(), escrow, token, authorization).await?;
    println!(
        "Authorized {} to lock up to {} of token {} ({} seconds, {} locks)",
        payee,
        max_locked,
        token,
        authorization.max_lock_seconds,
        authorization.max_lock_counts
    );
    Ok(())
}

pub async fn withdraw_from_escrow(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let (token, decimals) = token_param(ctx, args, "token").await?;
    let amount_text = args.require("amount")?;
    let amount = chain::to_base_units(amount_text, decimals)?;
    let escrow = ctx.contracts()?.escrow()?;
    let provider = ctx.session.provider();

    let (available, _locked) =
        chain::escrow_funds(provider, escrow, ctx.session.address(), token).await?;
    if available < amount {
        return Err(CliError::InvalidArgument(format!(
            "only {} of token {} available in escrow",
            chain::to_display_units(available, decimals)?,
            token
        )));
    }

    chain::escrow_withdraw(provider, escrow, token, amount).await?;
    println!("Withdrew {} of token {} from escrow", amount_text, token);
    Ok(())
}

pub async fn get_user_funds_escrow(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let (token, decimals) = token_param(ctx, args, "token").await?;
    let escrow = ctx.contracts()?.escrow()?;

    let (available, locked) =
        chain::escrow_funds(ctx.session.provider(), escrow, ctx.session.address(), token).await?;
    println!("Available: {}", chain::to_display_units(available, decimals)?);
    println!("Locked: {}", chain::to_display_units(locked, decimals)?);
    Ok(())
}
