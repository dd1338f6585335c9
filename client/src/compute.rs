//! Compute job lifecycle: initialize, confirm payment, start.
//!
//! Paid jobs go `Initializing -> AwaitingConfirmation -> Starting -> Running`
//! and may stop at `Cancelled` when the operator refuses the price. Free jobs
//! go straight to `Starting`. Once running, the job lives on the provider and
//! is only ever queried.

use crate::chain;
use crate::console::{is_affirmative, Prompt};
use crate::registry::BoundArgs;
use async_trait::async_trait;
use ocean_cli_shared::{
    CliError, CliResult, ComputeJob, ComputeResourceRequest, InitializeComputeResponse,
    PaymentQuote,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Everything a paid job needs before the first remote call
#[derive(Debug, Clone, PartialEq)]
pub struct PaidComputeRequest {
    pub dataset_dids: Vec<String>,
    pub algo_did: String,
    pub compute_env_id: String,
    pub max_job_duration: u64,
    pub payment_token: String,
    pub resources: Vec<ComputeResourceRequest>,
    pub accept: bool,
}

impl PaidComputeRequest {
    pub const PARAMS: [&'static str; 6] = [
        "datasetDids",
        "algoDid",
        "computeEnvId",
        "maxJobDuration",
        "paymentToken",
        "resources",
    ];

    /// Fails with every missing parameter named, before anything remote runs
    pub fn from_args(args: &BoundArgs) -> CliResult<Self> {
        let missing: Vec<String> = Self::PARAMS
            .iter()
            .filter(|name| args.get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CliError::missing(args.command(), missing));
        }

        let dataset_dids = parse_did_list(args.require("datasetDids")?)?;
        let resources = parse_resources(args.require("resources")?)?;
        let mut empty = Vec::new();
        if dataset_dids.is_empty() {
            empty.push("datasetDids".to_string());
        }
        if resources.is_empty() {
            empty.push("resources".to_string());
        }
        if !empty.is_empty() {
            return Err(CliError::missing(args.command(), empty));
        }

        let max_job_duration = args.require("maxJobDuration")?.trim().parse().map_err(|_| {
            CliError::InvalidArgument("maxJobDuration must be a number of seconds".to_string())
        })?;

        Ok(Self {
            dataset_dids,
            algo_did: args.require("algoDid")?.to_string(),
            compute_env_id: args.require("computeEnvId")?.to_string(),
            max_job_duration,
            payment_token: args.require("paymentToken")?.to_string(),
            resources,
            accept: args.flag("accept"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeComputeRequest {
    pub dataset_dids: Vec<String>,
    pub algo_did: String,
    pub compute_env_id: String,
}

impl FreeComputeRequest {
    pub fn from_args(args: &BoundArgs) -> CliResult<Self> {
        let dataset_dids = parse_did_list(args.require("datasetDids")?)?;
        if dataset_dids.is_empty() {
            return Err(CliError::missing(args.command(), vec!["datasetDids".to_string()]));
        }
        Ok(Self {
            dataset_dids,
            algo_did: args.require("algoDid")?.to_string(),
            compute_env_id: args.require("computeEnvId")?.to_string(),
        })
    }
}

/// `'["did:op:a","did:op:b"]'` or `did:op:a,did:op:b`
pub fn parse_did_list(raw: &str) -> CliResult<Vec<String>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let dids: Vec<String> = serde_json::from_str(raw).map_err(|e| {
            CliError::InvalidArgument(format!("datasetDids is not a JSON array of strings: {}", e))
        })?;
        return Ok(dids.into_iter().filter(|d| !d.trim().is_empty()).collect());
    }
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect())
}

/// `'[{"id":"cpu","amount":2},{"id":"ram","amount":4}]'`
pub fn parse_resources(raw: &str) -> CliResult<Vec<ComputeResourceRequest>> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        CliError::InvalidArgument(format!(
            "resources must be a JSON array of {{\"id\", \"amount\"}} objects: {}",
            e
        ))
    })
}

/// Reference to a job running on a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeJobHandle {
    pub job_id: String,
    pub dataset_dids: Vec<String>,
    pub algo_did: String,
    pub environment_id: String,
    pub agreement_id: Option<String>,
}

impl fmt::Display for ComputeJobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compute started. JobID: {}", self.job_id)?;
        if let Some(agreement_id) = &self.agreement_id {
            write!(f, "\nAgreement ID: {}", agreement_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutcome {
    Started(ComputeJobHandle),
    /// Operator refused the quoted price; nothing was charged
    Cancelled,
}

/// Remote side of the lifecycle
#[async_trait]
pub trait ComputeBackend: Send {
    /// `Ok(None)` means the provider gave no usable answer
    async fn initialize(
        &mut self,
        request: &PaidComputeRequest,
    ) -> CliResult<Option<InitializeComputeResponse>>;

    async fn token_decimals(&mut self, token: &str) -> CliResult<u8>;

    async fn start(
        &mut self,
        request: &PaidComputeRequest,
        initialized: &InitializeComputeResponse,
    ) -> CliResult<Vec<ComputeJob>>;

    async fn start_free(&mut self, request: &FreeComputeRequest) -> CliResult<Vec<ComputeJob>>;
}

/// Validate arguments and run a paid job
pub async fn start_paid_compute(
    backend: &mut dyn ComputeBackend,
    prompt: &mut dyn Prompt,
    args: &BoundArgs,
) -> CliResult<ComputeOutcome> {
    let request = PaidComputeRequest::from_args(args)?;
    run_paid_compute(backend, prompt, &request).await
}

pub async fn run_paid_compute(
    backend: &mut dyn ComputeBackend,
    prompt: &mut dyn Prompt,
    request: &PaidComputeRequest,
) -> CliResult<ComputeOutcome> {
    info!(
        "🧮 Initializing compute on {} with algorithm {}",
        request.compute_env_id, request.algo_did
    );
    let initialized = match backend.initialize(request).await {
        Ok(Some(initialized)) => initialized,
        Ok(None) => {
            return Err(CliError::Initialization(
                "provider returned no initialize response".to_string(),
            ))
        }
        Err(e) => return Err(CliError::Initialization(e.to_string())),
    };
    let quote = initialized.payment.clone().ok_or_else(|| {
        CliError::Initialization("initialize response carries no payment quote".to_string())
    })?;
    debug!("Payment quote: {:?}", quote);

    if !confirm_payment(backend, prompt, &quote, request.accept).await? {
        info!("Compute cancelled, no job started");
        return Ok(ComputeOutcome::Cancelled);
    }

    info!("🚀 Starting compute job");
    let jobs = backend
        .start(request, &initialized)
        .await
        .map_err(|e| match e {
            CliError::Start(_) => e,
            other => CliError::Start(other.to_string()),
        })?;
    let job = first_job(jobs)?;

    Ok(ComputeOutcome::Started(ComputeJobHandle {
        job_id: job.job_id,
        dataset_dids: request.dataset_dids.clone(),
        algo_did: request.algo_did.clone(),
        environment_id: request.compute_env_id.clone(),
        agreement_id: job.agreement_id,
    }))
}

/// Free jobs skip the quote and the confirmation entirely
pub async fn run_free_compute(
    backend: &mut dyn ComputeBackend,
    request: &FreeComputeRequest,
) -> CliResult<ComputeOutcome> {
    info!("🚀 Starting free compute on {}", request.compute_env_id);
    let jobs = backend
        .start_free(request)
        .await
        .map_err(|e| CliError::Start(e.to_string()))?;
    let job = first_job(jobs)?;

    Ok(ComputeOutcome::Started(ComputeJobHandle {
        job_id: job.job_id,
        dataset_dids: request.dataset_dids.clone(),
        algo_did: request.algo_did.clone(),
        environment_id: request.compute_env_id.clone(),
        agreement_id: None,
    }))
}

fn first_job(jobs: Vec<ComputeJob>) -> CliResult<ComputeJob> {
    jobs.into_iter()
        .find(|job| !job.job_id.trim().is_empty())
        .ok_or_else(|| CliError::Start("provider returned no job".to_string()))
}

async fn confirm_payment(
    backend: &mut dyn ComputeBackend,
    prompt: &mut dyn Prompt,
    quote: &PaymentQuote,
    accept: bool,
) -> CliResult<bool> {
    let base_units = chain::parse_u256(&quote.amount, "payment amount")?;
    let decimals = backend.token_decimals(&quote.token).await?;
    let price = chain::to_display_units(base_units, decimals)?;

    if accept {
        info!(
            "--accept set, paying {} of token {} into escrow {}",
            price, quote.token, quote.escrow_address
        );
        return Ok(true);
    }
    if !prompt.is_interactive() {
        return Err(CliError::NonInteractiveConfirmation);
    }

    let question = format!(
        "This compute job costs {} (token {}), paid through escrow {}. Proceed? (y/n)",
        price, quote.token, quote.escrow_address
    );
    let answer = prompt.ask(&question)?;
    if is_affirmative(&answer) {
        Ok(true)
    } else {
        warn!("Payment not confirmed (answer: {:?})", answer.trim());
        Ok(false)
    }
}
