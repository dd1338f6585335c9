//! Compute commands and the node/chain backed [`ComputeBackend`].

use super::access::order_service;
use super::{print_json, CommandContext};
use crate::chain::{self, EscrowAuthorization};
use crate::compute::{
    run_free_compute, start_paid_compute, ComputeBackend, ComputeOutcome, FreeComputeRequest,
    PaidComputeRequest,
};
use crate::console::Prompt;
use crate::node::{save_response, stream_to_stdout, NodeClient, SignedJobQuery};
use crate::registry::BoundArgs;
use alloy::primitives::U256;
use async_trait::async_trait;
use ocean_cli_shared::{
    CliError, CliResult, ComputeAsset, ComputeJob, ComputePayment, Ddo, InitializeComputeRequest,
    InitializeComputeResponse, InitializedAsset, PaymentQuote, StartComputeRequest,
    StopComputeRequest,
};
use std::path::Path;
use tracing::{debug, info};

/// Datasets and algorithm resolved for one job
struct ResolvedAssets {
    datasets: Vec<(Ddo, ComputeAsset)>,
    algorithm: (Ddo, ComputeAsset),
}

pub struct NodeComputeBackend<'c, 'a> {
    ctx: &'c CommandContext<'a>,
    resolved: Option<ResolvedAssets>,
}

impl<'c, 'a> NodeComputeBackend<'c, 'a> {
    pub fn new(ctx: &'c CommandContext<'a>) -> Self {
        Self {
            ctx,
            resolved: None,
        }
    }

    async fn resolve_asset(&self, did: &str) -> CliResult<(Ddo, ComputeAsset)> {
        let ddo = self.ctx.node.resolve_ddo(did).await?;
        let service_id = ddo
            .compute_service()
            .map(|service| service.id.clone())
            .ok_or_else(|| CliError::InvalidArgument(format!("{} has no services", did)))?;
        let asset = ComputeAsset {
            document_id: did.to_string(),
            service_id,
            transfer_tx_id: None,
        };
        Ok((ddo, asset))
    }

    async fn resolve(&self, dataset_dids: &[String], algo_did: &str) -> CliResult<ResolvedAssets> {
        let mut datasets = Vec::with_capacity(dataset_dids.len());
        for did in dataset_dids {
            datasets.push(self.resolve_asset(did).await?);
        }
        let algorithm = self.resolve_asset(algo_did).await?;
        Ok(ResolvedAssets {
            datasets,
            algorithm,
        })
    }

    /// Make sure the escrow holds the quoted amount and the payee may lock it
    async fn ensure_escrow(&self, quote: &PaymentQuote, max_job_duration: u64) -> CliResult<()> {
        let provider = self.ctx.session.provider();
        let payer = self.ctx.session.address();
        let escrow = chain::parse_address(&quote.escrow_address, "escrowAddress")?;
        let token = chain::parse_address(&quote.token, "payment token")?;
        let amount = chain::parse_u256(&quote.amount, "payment amount")?;

        let (available, _locked) = chain::escrow_funds(provider, escrow, payer, token).await?;
        if available < amount {
            let shortfall = amount - available;
            info!("💰 Depositing {} base units into escrow {}", shortfall, escrow);
            chain::approve(provider, token, escrow, shortfall).await?;
            chain::escrow_deposit(provider, escrow, token, shortfall).await?;
        }

        let authorization = EscrowAuthorization {
            payee: chain::parse_address(&quote.payee, "payee")?,
            max_locked_amount: amount,
            max_lock_seconds: U256::from(quote.min_lock_seconds.max(max_job_duration)),
            max_lock_counts: U256::from(1u64),
        };
        chain::escrow_authorize(provider, escrow, token, authorization).await?;
        Ok(())
    }

    /// Attach an order to `asset`, placing one when the provider asks for it
    async fn ensure_order(
        &self,
        ddo: &Ddo,
        asset: &mut ComputeAsset,
        initialized: Option<&InitializedAsset>,
    ) -> CliResult<()> {
        let Some(initialized) = initialized else {
            return Ok(());
        };
        if let Some(order) = &initialized.valid_order {
            asset.transfer_tx_id = Some(order.clone());
            return Ok(());
        }
        if let (true, Some(datatoken), Some(fees)) = (
            initialized.needs_order(),
            initialized.datatoken.as_deref(),
            initialized.provider_fee.as_ref(),
        ) {
            let tx = order_service(self.ctx, ddo, &asset.service_id, datatoken, fees).await?;
            asset.transfer_tx_id = Some(tx);
        }
        Ok(())
    }

    async fn signed_start_request(
        &self,
        datasets: Vec<ComputeAsset>,
        algorithm: ComputeAsset,
        environment: &str,
    ) -> CliResult<StartComputeRequest> {
        let consumer_address = self.ctx.session.consumer_address();
        let first = datasets
            .first()
            .map(|asset| asset.document_id.clone())
            .unwrap_or_default();
        let (nonce, signature) = self
            .ctx
            .sign_with_nonce(&format!("{}{}", consumer_address, first))
            .await?;
        Ok(StartComputeRequest {
            datasets,
            algorithm,
            environment: environment.to_string(),
            consumer_address,
            nonce,
            signature,
            payment: None,
            max_job_duration: None,
            resources: None,
            initialize_response: None,
        })
    }
}

#[async_trait]
impl ComputeBackend for NodeComputeBackend<'_, '_> {
    async fn initialize(
        &mut self,
        request: &PaidComputeRequest,
    ) -> CliResult<Option<InitializeComputeResponse>> {
        let resolved = self.resolve(&request.dataset_dids, &request.algo_did).await?;
        let body = InitializeComputeRequest {
            datasets: resolved.datasets.iter().map(|(_, a)| a.clone()).collect(),
            algorithm: resolved.algorithm.1.clone(),
            environment: request.compute_env_id.clone(),
            payment: ComputePayment {
                chain_id: self.ctx.session.chain_id(),
                token: request.payment_token.clone(),
                resources: request.resources.clone(),
            },
            max_job_duration: request.max_job_duration,
            consumer_address: self.ctx.session.consumer_address(),
        };
        self.resolved = Some(resolved);
        self.ctx.node.initialize_compute(&body).await
    }

    async fn token_decimals(&mut self, token: &str) -> CliResult<u8> {
        let token = chain::parse_address(token, "payment token")?;
        chain::token_decimals(self.ctx.session.provider(), token).await
    }

    async fn start(
        &mut self,
        request: &PaidComputeRequest,
        initialized: &InitializeComputeResponse,
    ) -> CliResult<Vec<ComputeJob>> {
        let quote = initialized
            .payment
            .as_ref()
            .ok_or_else(|| CliError::Start("no payment quote to pay".to_string()))?;
        let resolved = match self.resolved.take() {
            Some(resolved) => resolved,
            None => self.resolve(&request.dataset_dids, &request.algo_did).await?,
        };

        self.ensure_escrow(quote, request.max_job_duration).await?;

        let mut datasets = Vec::with_capacity(resolved.datasets.len());
        for (index, (ddo, mut asset)) in resolved.datasets.into_iter().enumerate() {
            self.ensure_order(&ddo, &mut asset, initialized.datasets.get(index))
                .await?;
            datasets.push(asset);
        }
        let (algo_ddo, mut algorithm) = resolved.algorithm;
        self.ensure_order(&algo_ddo, &mut algorithm, initialized.algorithm.as_ref())
            .await?;

        let mut body = self
            .signed_start_request(datasets, algorithm, &request.compute_env_id)
            .await?;
        body.payment = Some(ComputePayment {
            chain_id: self.ctx.session.chain_id(),
            token: request.payment_token.clone(),
            resources: request.resources.clone(),
        });
        body.max_job_duration = Some(request.max_job_duration);
        body.resources = Some(request.resources.clone());
        body.initialize_response = Some(serde_json::to_value(initialized)?);

        self.ctx.node.start_compute(&body).await
    }

    async fn start_free(&mut self, request: &FreeComputeRequest) -> CliResult<Vec<ComputeJob>> {
        let resolved = self.resolve(&request.dataset_dids, &request.algo_did).await?;
        let datasets = resolved.datasets.into_iter().map(|(_, a)| a).collect();
        let body = self
            .signed_start_request(datasets, resolved.algorithm.1, &request.compute_env_id)
            .await?;
        self.ctx.node.start_free_compute(&body).await
    }
}

fn print_outcome(outcome: ComputeOutcome) {
    match outcome {
        ComputeOutcome::Started(handle) => println!("{}", handle),
        ComputeOutcome::Cancelled => println!("Compute cancelled"),
    }
}

pub async fn start_compute(
    ctx: &CommandContext<'_>,
    prompt: &mut dyn Prompt,
    args: &BoundArgs,
) -> CliResult<()> {
    let mut backend = NodeComputeBackend::new(ctx);
    let outcome = start_paid_compute(&mut backend, prompt, args).await?;
    print_outcome(outcome);
    Ok(())
}

pub async fn start_free_compute(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let request = FreeComputeRequest::from_args(args)?;
    let mut backend = NodeComputeBackend::new(ctx);
    let outcome = run_free_compute(&mut backend, &request).await?;
    print_outcome(outcome);
    Ok(())
}

pub async fn get_compute_environments(node: &NodeClient) -> CliResult<()> {
    let environments = node.compute_environments().await?;
    if environments.is_empty() {
        info!("Node offers no compute environments");
    }
    print_json(&environments)
}

pub async fn compute_streamable_logs(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let job_id = args.require("jobId")?;
    let consumer = ctx.session.consumer_address();
    let (nonce, signature) = ctx.sign_with_nonce(&format!("{}{}", consumer, job_id)).await?;

    let response = ctx
        .node
        .streamable_logs(&SignedJobQuery {
            consumer_address: &consumer,
            job_id,
            nonce: &nonce,
            signature: &signature,
        })
        .await?;
    let written = stream_to_stdout(response).await?;
    info!("✓ Log stream for {} closed ({} bytes)", job_id, written);
    Ok(())
}

pub async fn stop_compute(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let dataset_did = args.require("datasetDid")?;
    let job_id = args.require("jobId")?;
    let consumer = ctx.session.consumer_address();
    debug!("Stopping {} on {}", job_id, dataset_did);

    let (nonce, signature) = ctx.sign_with_nonce(&format!("{}{}", consumer, job_id)).await?;
    let jobs = ctx
        .node
        .stop_compute(&StopComputeRequest {
            consumer_address: consumer,
            job_id: job_id.to_string(),
            agreement_id: args.get("agreementId").map(str::to_string),
            nonce,
            signature,
        })
        .await?;
    print_json(&jobs)
}

pub async fn get_job_status(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let dataset_did = args.require("datasetDid")?;
    let job_id = args.require("jobId")?;
    debug!("Status of {} on {}", job_id, dataset_did);

    let jobs = ctx
        .node
        .compute_status(&ctx.session.consumer_address(), job_id, args.get("agreementId"))
        .await?;
    if jobs.is_empty() {
        return Err(CliError::RemoteService {
            status: 404,
            message: format!("no compute job {} found", job_id),
        });
    }
    print_json(&jobs)
}

pub async fn download_job_results(ctx: &CommandContext<'_>, args: &BoundArgs) -> CliResult<()> {
    let job_id = args.require("jobId")?;
    let index: u32 = args.require("resultIndex")?.trim().parse().map_err(|_| {
        CliError::InvalidArgument("resultIndex must be a non-negative integer".to_string())
    })?;
    let folder = args.get("destinationFolder").unwrap_or(".");
    let consumer = ctx.session.consumer_address();

    let (nonce, signature) = ctx
        .sign_with_nonce(&format!("{}{}{}", consumer, job_id, index))
        .await?;
    let response = ctx
        .node
        .compute_result(
            &SignedJobQuery {
                consumer_address: &consumer,
                job_id,
                nonce: &nonce,
                signature: &signature,
            },
            index,
        )
        .await?;

    let fallback = format!("result-{}-{}", job_id, index);
    let path = save_response(response, Path::new(folder), &fallback).await?;
    println!("Result downloaded to {}", path.display());
    Ok(())
}
