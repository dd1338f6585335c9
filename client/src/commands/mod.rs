//! Command handlers and the runner that wires them to the dispatcher.

pub mod access;
pub mod assets;
pub mod auth;
pub mod compute;
pub mod escrow;

use crate::addresses::ContractAddresses;
use crate::compute::{FreeComputeRequest, PaidComputeRequest};
use crate::config::Settings;
use crate::console::Prompt;
use crate::dispatcher::Executor;
use crate::node::NodeClient;
use crate::registry::{BoundArgs, CommandDescriptor, CommandRegistry, Handler};
use crate::session::Session;
use async_trait::async_trait;
use ocean_cli_shared::{CliError, CliResult};
use serde::Serialize;
use tracing::debug;

/// Everything a session-backed handler works with
pub struct CommandContext<'a> {
    pub settings: &'a Settings,
    pub node: &'a NodeClient,
    pub session: &'a Session,
}

impl<'a> CommandContext<'a> {
    /// Contract addresses for the session's chain
    pub fn contracts(&self) -> CliResult<ContractAddresses> {
        ContractAddresses::load(self.settings.address_file.as_deref(), self.session.chain_id())
    }

    /// Fetch the next nonce and sign `prefix + nonce`
    pub async fn sign_with_nonce(&self, prefix: &str) -> CliResult<(String, String)> {
        let nonce = self.node.next_nonce(&self.session.consumer_address()).await?;
        let signature = self
            .session
            .sign_request(&format!("{}{}", prefix, nonce))
            .await?;
        Ok((nonce, signature))
    }
}

/// Executes registry commands against the configured node and chain
pub struct CommandRunner {
    settings: Settings,
    node: NodeClient,
    prompt: Box<dyn Prompt>,
}

impl CommandRunner {
    pub fn new(settings: Settings, node: NodeClient, prompt: Box<dyn Prompt>) -> Self {
        Self {
            settings,
            node,
            prompt,
        }
    }
}

#[async_trait]
impl Executor for CommandRunner {
    async fn execute(
        &mut self,
        registry: &CommandRegistry,
        command: &CommandDescriptor,
        args: BoundArgs,
    ) -> CliResult<()> {
        debug!("Running {} ({:?})", command.name, command.handler);

        // Compute arguments fail here, before the RPC is touched
        match command.handler {
            Handler::StartCompute => {
                PaidComputeRequest::from_args(&args)?;
            }
            Handler::StartFreeCompute => {
                FreeComputeRequest::from_args(&args)?;
            }
            _ => {}
        }

        // Built once per command, and only when the command signs or sends transactions
        let session = if command.needs_session {
            Some(Session::initialize(&self.settings).await?)
        } else {
            None
        };
        let node = &self.node;

        match command.handler {
            Handler::Help => {
                println!("{}", registry.render_help());
                Ok(())
            }
            Handler::GetDdo => assets::get_ddo(node, &args).await,
            Handler::GetComputeEnvironments => compute::get_compute_environments(node).await,
            handler => {
                let session = session.as_ref().ok_or_else(|| CliError::InvalidDescriptor {
                    command: command.name.to_string(),
                    reason: "handler needs a session".to_string(),
                })?;
                let ctx = CommandContext {
                    settings: &self.settings,
                    node,
                    session,
                };
                run_with_session(handler, &ctx, self.prompt.as_mut(), &args).await
            }
        }
    }
}

async fn run_with_session(
    handler: Handler,
    ctx: &CommandContext<'_>,
    prompt: &mut dyn Prompt,
    args: &BoundArgs,
) -> CliResult<()> {
    match handler {
        Handler::Publish => assets::publish(ctx, args, false).await,
        Handler::PublishAlgo => assets::publish(ctx, args, true).await,
        Handler::EditAsset => assets::edit_asset(ctx, args).await,
        Handler::AllowAlgo => assets::allow_algo(ctx, args).await,
        Handler::DisallowAlgo => assets::disallow_algo(ctx, args).await,
        Handler::Download => access::download(ctx, args).await,
        Handler::StartCompute => compute::start_compute(ctx, prompt, args).await,
        Handler::StartFreeCompute => compute::start_free_compute(ctx, args).await,
        Handler::ComputeStreamableLogs => compute::compute_streamable_logs(ctx, args).await,
        Handler::StopCompute => compute::stop_compute(ctx, args).await,
        Handler::GetJobStatus => compute::get_job_status(ctx, args).await,
        Handler::DownloadJobResults => compute::download_job_results(ctx, args).await,
        Handler::MintOcean => escrow::mint_ocean(ctx).await,
        Handler::DepositEscrow => escrow::deposit_escrow(ctx, args).await,
        Handler::AuthorizeEscrow => escrow::authorize_escrow(ctx, args).await,
        Handler::WithdrawFromEscrow => escrow::withdraw_from_escrow(ctx, args).await,
        Handler::GetUserFundsEscrow => escrow::get_user_funds_escrow(ctx, args).await,
        Handler::GenerateAuthToken => auth::generate_auth_token(ctx, args).await,
        Handler::InvalidateAuthToken => auth::invalidate_auth_token(ctx, args).await,
        Handler::Help | Handler::GetDdo | Handler::GetComputeEnvironments => Ok(()),
    }
}

/// `true`/`false` style parameter value
pub fn bool_param(args: &BoundArgs, name: &str, default: bool) -> CliResult<bool> {
    match args.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(CliError::InvalidArgument(format!(
                "{} must be true or false, got '{}'",
                name, value
            ))),
        },
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
