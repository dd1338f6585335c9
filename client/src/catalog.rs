//! The command table served by the binary.

use crate::registry::{CommandDescriptor, CommandRegistry, Handler, ParamSpec};
use ocean_cli_shared::CliResult;

/// `encrypt` switch shared by every command that writes metadata
fn encrypt_param() -> ParamSpec {
    ParamSpec::optional("encrypt", Some("true"), "Encrypt the DDO through the node").short('e')
}

fn agreement_param() -> ParamSpec {
    ParamSpec::optional("agreementId", None, "Agreement id of a paid job").short('a')
}

fn descriptors() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::new("help", Handler::Help, "Show this command listing").alias("h"),
        CommandDescriptor::new("getDDO", Handler::GetDdo, "Resolve a DID and print its DDO")
            .param(ParamSpec::required("did", "Asset DID").short('d')),
        CommandDescriptor::new("publish", Handler::Publish, "Publish a dataset from a DDO file")
            .param(ParamSpec::required("metadataFile", "Path to the DDO JSON").short('f'))
            .param(encrypt_param())
            .with_session(),
        CommandDescriptor::new(
            "publishAlgo",
            Handler::PublishAlgo,
            "Publish an algorithm from a DDO file",
        )
        .param(ParamSpec::required("metadataFile", "Path to the DDO JSON").short('f'))
        .param(encrypt_param())
        .with_session(),
        CommandDescriptor::new("editAsset", Handler::EditAsset, "Replace the metadata of an asset")
            .alias("edit")
            .param(ParamSpec::required("datasetDid", "Asset DID").short('d'))
            .param(ParamSpec::required("metadataFile", "Path to the updated DDO JSON").short('f'))
            .param(encrypt_param())
            .with_session(),
        CommandDescriptor::new("download", Handler::Download, "Order and download an asset")
            .param(ParamSpec::required("did", "Asset DID").short('d'))
            .param(ParamSpec::optional("folder", Some("."), "Destination folder").short('f'))
            .with_session(),
        CommandDescriptor::new("allowAlgo", Handler::AllowAlgo, "Trust an algorithm on a dataset")
            .param(ParamSpec::required("datasetDid", "Dataset DID").short('d'))
            .param(ParamSpec::required("algoDid", "Algorithm DID").short('a'))
            .param(encrypt_param())
            .with_session(),
        CommandDescriptor::new(
            "disallowAlgo",
            Handler::DisallowAlgo,
            "Remove a trusted algorithm from a dataset",
        )
        .param(ParamSpec::required("datasetDid", "Dataset DID").short('d'))
        .param(ParamSpec::required("algoDid", "Algorithm DID").short('a'))
        .param(encrypt_param())
        .with_session(),
        CommandDescriptor::new("startCompute", Handler::StartCompute, "Start a paid compute job")
            .param(
                ParamSpec::required("datasetDids", "Dataset DIDs, JSON array or comma separated")
                    .short('d'),
            )
            .param(ParamSpec::required("algoDid", "Algorithm DID").short('a'))
            .param(ParamSpec::required("computeEnvId", "Compute environment id").short('e'))
            .param(
                ParamSpec::required("maxJobDuration", "Maximum job duration in seconds").short('t'),
            )
            .param(ParamSpec::required("paymentToken", "Payment token address").short('p'))
            .param(
                ParamSpec::required("resources", "Resources, JSON array of {id, amount}")
                    .short('r'),
            )
            .flag("accept", None, "Pay the quoted price without asking")
            .with_session(),
        CommandDescriptor::new(
            "startFreeCompute",
            Handler::StartFreeCompute,
            "Start a free compute job",
        )
        .param(
            ParamSpec::required("datasetDids", "Dataset DIDs, JSON array or comma separated")
                .short('d'),
        )
        .param(ParamSpec::required("algoDid", "Algorithm DID").short('a'))
        .param(ParamSpec::required("computeEnvId", "Compute environment id").short('e'))
        .with_session(),
        CommandDescriptor::new(
            "getComputeEnvironments",
            Handler::GetComputeEnvironments,
            "List the node's compute environments",
        )
        .alias("getC2DEnvs"),
        CommandDescriptor::new(
            "computeStreamableLogs",
            Handler::ComputeStreamableLogs,
            "Stream the logs of a running job",
        )
        .param(ParamSpec::required("jobId", "Compute job id").short('j'))
        .with_session(),
        CommandDescriptor::new("stopCompute", Handler::StopCompute, "Stop a compute job")
            .param(ParamSpec::required("datasetDid", "Dataset DID").short('d'))
            .param(ParamSpec::required("jobId", "Compute job id").short('j'))
            .param(agreement_param())
            .with_session(),
        CommandDescriptor::new(
            "getJobStatus",
            Handler::GetJobStatus,
            "Print the status of a compute job",
        )
        .param(ParamSpec::required("datasetDid", "Dataset DID").short('d'))
        .param(ParamSpec::required("jobId", "Compute job id").short('j'))
        .param(agreement_param())
        .with_session(),
        CommandDescriptor::new(
            "downloadJobResults",
            Handler::DownloadJobResults,
            "Download one result file of a job",
        )
        .param(ParamSpec::required("jobId", "Compute job id").short('j'))
        .param(ParamSpec::required("resultIndex", "Index of the result file").short('i'))
        .param(ParamSpec::optional("destinationFolder", Some("."), "Destination folder").short('f'))
        .with_session(),
        CommandDescriptor::new("mintOcean", Handler::MintOcean, "Mint 1000 OCEAN to the signer")
            .with_session(),
        CommandDescriptor::new(
            "generateAuthToken",
            Handler::GenerateAuthToken,
            "Create a provider auth token",
        )
        .param(ParamSpec::optional("validUntil", None, "Expiry as a unix timestamp"))
        .with_session(),
        CommandDescriptor::new(
            "invalidateAuthToken",
            Handler::InvalidateAuthToken,
            "Invalidate a provider auth token",
        )
        .param(ParamSpec::required("token", "Auth token").short('t'))
        .with_session(),
        CommandDescriptor::new("depositEscrow", Handler::DepositEscrow, "Deposit into escrow")
            .param(ParamSpec::required("token", "Token address").short('t'))
            .param(ParamSpec::required("amount", "Amount in token units").short('a'))
            .with_session(),
        CommandDescriptor::new(
            "authorizeEscrow",
            Handler::AuthorizeEscrow,
            "Allow a payee to lock escrow funds",
        )
        .param(ParamSpec::required("token", "Token address").short('t'))
        .param(ParamSpec::required("payee", "Payee address").short('p'))
        .param(ParamSpec::required("maxLockedAmount", "Maximum locked amount in token units"))
        .param(ParamSpec::required("maxLockSeconds", "Maximum lock duration in seconds"))
        .param(ParamSpec::required("maxLockCounts", "Maximum number of concurrent locks"))
        .with_session(),
        CommandDescriptor::new(
            "withdrawFromEscrow",
            Handler::WithdrawFromEscrow,
            "Withdraw available escrow funds",
        )
        .param(ParamSpec::required("token", "Token address").short('t'))
        .param(ParamSpec::required("amount", "Amount in token units").short('a'))
        .with_session(),
        CommandDescriptor::new(
            "getUserFundsEscrow",
            Handler::GetUserFundsEscrow,
            "Show available and locked escrow funds",
        )
        .param(ParamSpec::required("token", "Token address").short('t'))
        .with_session(),
    ]
}

/// Registry with every command; fails on a duplicate name or bad descriptor
pub fn build_registry() -> CliResult<CommandRegistry> {
    let mut registry = CommandRegistry::new();
    for descriptor in descriptors() {
        registry.register(descriptor)?;
    }
    Ok(registry)
}
