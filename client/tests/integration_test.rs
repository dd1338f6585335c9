use async_trait::async_trait;
use httpmock::prelude::*;
use ocean_cli::catalog::build_registry;
use ocean_cli::compute::{
    run_free_compute, start_paid_compute, ComputeBackend, ComputeOutcome, FreeComputeRequest,
    PaidComputeRequest,
};
use ocean_cli::commands::CommandRunner;
use ocean_cli::config::{Credential, Settings};
use ocean_cli::console::{LineReader, Prompt};
use ocean_cli::dispatcher::{Dispatcher, Executor, LoopMode};
use ocean_cli::input::{split_arguments, tokenize};
use ocean_cli::node::{save_response, NodeClient};
use ocean_cli::registry::{BoundArgs, CommandDescriptor, CommandRegistry};
use ocean_cli_shared::{CliError, CliResult, ComputeJob, InitializeComputeResponse};
use serial_test::serial;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

struct ScriptedReader {
    lines: VecDeque<String>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedReader {
    fn new(lines: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            reads: reads.clone(),
        };
        (reader, reads)
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lines.pop_front()
    }
}

#[derive(Clone, Default)]
struct RecordingExecutor {
    executed: Arc<Mutex<Vec<(String, BoundArgs)>>>,
    in_flight: Arc<AtomicBool>,
    fail_on: Option<&'static str>,
    non_interactive_on: Option<&'static str>,
}

impl RecordingExecutor {
    fn names(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(
        &mut self,
        _registry: &CommandRegistry,
        command: &CommandDescriptor,
        args: BoundArgs,
    ) -> CliResult<()> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "commands overlapped"
        );
        self.executed
            .lock()
            .unwrap()
            .push((command.name.to_string(), args));
        tokio::task::yield_now().await;
        self.in_flight.store(false, Ordering::SeqCst);

        if self.fail_on == Some(command.name) {
            return Err(CliError::Start("provider rejected the job".to_string()));
        }
        if self.non_interactive_on == Some(command.name) {
            return Err(CliError::NonInteractiveConfirmation);
        }
        Ok(())
    }
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_commands_run_in_order_and_errors_do_not_stop_the_loop() {
    let registry = build_registry().unwrap();
    let (reader, _) = ScriptedReader::new(&[
        "getDDO did:op:1",
        "stopCompute did:op:a job-1",
        "getC2DEnvs",
        "exit",
        "getDDO did:op:never",
    ]);
    let executor = RecordingExecutor {
        fail_on: Some("stopCompute"),
        ..Default::default()
    };

    let summary = Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(Vec::new())
        .await;

    assert_eq!(
        executor.names(),
        vec!["getDDO", "stopCompute", "getComputeEnvironments"]
    );
    assert_eq!(summary.executed, 3);
    assert_eq!(summary.failed, 1);
    assert!(summary.last_failure.is_none());
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_invalid_and_empty_lines_reprompt() {
    let registry = build_registry().unwrap();
    let (reader, reads) = ScriptedReader::new(&["frobnicate now", "", "   ", "quit"]);
    let executor = RecordingExecutor::default();

    let summary = Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(Vec::new())
        .await;

    assert!(executor.names().is_empty());
    assert_eq!(summary.executed, 0);
    assert_eq!(reads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_end_of_input_terminates() {
    let registry = build_registry().unwrap();
    let (reader, reads) = ScriptedReader::new(&[]);
    let executor = RecordingExecutor::default();

    let summary = Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(Vec::new())
        .await;

    assert_eq!(summary.executed, 0);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_one_shot_runs_only_the_initial_command() {
    let registry = build_registry().unwrap();
    let (reader, reads) = ScriptedReader::new(&["getDDO did:op:2"]);
    let executor = RecordingExecutor::default();

    Dispatcher::new(&registry, reader, executor.clone(), LoopMode::OneShot)
        .run(words(&["getDDO", "did:op:1"]))
        .await;

    let executed = executor.executed.lock().unwrap().clone();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].1.get("did"), Some("did:op:1"));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_shot_without_command_shows_help() {
    let registry = build_registry().unwrap();
    let (reader, _) = ScriptedReader::new(&[]);
    let executor = RecordingExecutor::default();

    Dispatcher::new(&registry, reader, executor.clone(), LoopMode::OneShot)
        .run(Vec::new())
        .await;

    assert_eq!(executor.names(), vec!["help"]);
}

#[tokio::test]
async fn test_failing_initial_command_still_opens_the_loop() {
    let registry = build_registry().unwrap();
    let (reader, _) = ScriptedReader::new(&["getDDO did:op:1"]);
    let executor = RecordingExecutor::default();

    let summary = Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(words(&["stopCompute"]))
        .await;

    // stopCompute never reached the executor: its arguments were missing
    assert_eq!(executor.names(), vec!["getDDO"]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.executed, 2);
}

#[tokio::test]
async fn test_exit_token_as_initial_command() {
    let registry = build_registry().unwrap();
    let (reader, reads) = ScriptedReader::new(&["getDDO did:op:1"]);
    let executor = RecordingExecutor::default();

    Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(words(&["\\q"]))
        .await;

    assert!(executor.names().is_empty());
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_named_options_reach_the_handler() {
    let registry = build_registry().unwrap();
    let (reader, _) = ScriptedReader::new(&[
        "download did:op:positional --did did:op:named -f /tmp/out",
        "startCompute did:op:a did:op:algo env-1 60 0x2473f4F7bf40ed9310838e2c6C7813bc2148A1A1 '[{\"id\":\"cpu\",\"amount\":1}]' --accept",
    ]);
    let executor = RecordingExecutor::default();

    Dispatcher::new(&registry, reader, executor.clone(), LoopMode::Interactive)
        .run(Vec::new())
        .await;

    let executed = executor.executed.lock().unwrap().clone();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].1.get("did"), Some("did:op:named"));
    assert_eq!(executed[0].1.get("folder"), Some("/tmp/out"));
    assert!(executed[1].1.flag("accept"));
    assert_eq!(
        executed[1].1.get("resources"),
        Some("[{\"id\":\"cpu\",\"amount\":1}]")
    );
}

#[tokio::test]
async fn test_non_interactive_confirmation_sets_exit_code() {
    let registry = build_registry().unwrap();
    let (reader, _) = ScriptedReader::new(&[]);
    let executor = RecordingExecutor {
        non_interactive_on: Some("startCompute"),
        ..Default::default()
    };

    let summary = Dispatcher::new(&registry, reader, executor, LoopMode::OneShot)
        .run(words(&[
            "startCompute",
            "did:op:a",
            "did:op:algo",
            "env-1",
            "60",
            "0x2473f4F7bf40ed9310838e2c6C7813bc2148A1A1",
            "[{\"id\":\"cpu\",\"amount\":1}]",
        ]))
        .await;

    assert!(matches!(
        summary.last_failure,
        Some(CliError::NonInteractiveConfirmation)
    ));
    assert_eq!(summary.exit_code(), 1);
}

// ---------------------------------------------------------------------------
// Compute lifecycle
// ---------------------------------------------------------------------------

const TOKEN: &str = "0x2473f4F7bf40ed9310838e2c6C7813bc2148A1A1";

#[derive(Default)]
struct FakeBackend {
    calls: Vec<&'static str>,
    initialize_response: Option<InitializeComputeResponse>,
    jobs: Vec<ComputeJob>,
    started_with_quote: Option<String>,
}

impl FakeBackend {
    fn quoting(amount: &str) -> Self {
        let response = serde_json::from_value(serde_json::json!({
            "algorithm": {"datatoken": "0x3333333333333333333333333333333333333333"},
            "datasets": [{"datatoken": "0x2222222222222222222222222222222222222222"}],
            "payment": {
                "escrowAddress": "0x4444444444444444444444444444444444444444",
                "payee": "0x5555555555555555555555555555555555555555",
                "chainId": 8996,
                "token": TOKEN,
                "amount": amount,
                "minLockSeconds": 3600
            }
        }))
        .unwrap();
        Self {
            initialize_response: Some(response),
            jobs: vec![job("0xjob1", Some("0xagreement"))],
            ..Default::default()
        }
    }
}

fn job(id: &str, agreement: Option<&str>) -> ComputeJob {
    let mut value = serde_json::json!({
        "jobId": id,
        "owner": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    });
    if let Some(agreement) = agreement {
        value["agreementId"] = serde_json::json!(agreement);
    }
    serde_json::from_value(value).unwrap()
}

#[async_trait]
impl ComputeBackend for FakeBackend {
    async fn initialize(
        &mut self,
        _request: &PaidComputeRequest,
    ) -> CliResult<Option<InitializeComputeResponse>> {
        self.calls.push("initialize");
        Ok(self.initialize_response.clone())
    }

    async fn token_decimals(&mut self, _token: &str) -> CliResult<u8> {
        self.calls.push("token_decimals");
        Ok(18)
    }

    async fn start(
        &mut self,
        _request: &PaidComputeRequest,
        initialized: &InitializeComputeResponse,
    ) -> CliResult<Vec<ComputeJob>> {
        self.calls.push("start");
        self.started_with_quote = initialized.payment.as_ref().map(|p| p.amount.clone());
        Ok(self.jobs.clone())
    }

    async fn start_free(&mut self, _request: &FreeComputeRequest) -> CliResult<Vec<ComputeJob>> {
        self.calls.push("start_free");
        Ok(self.jobs.clone())
    }
}

struct FakePrompt {
    interactive: bool,
    answer: &'static str,
    questions: Vec<String>,
}

impl FakePrompt {
    fn answering(answer: &'static str) -> Self {
        Self {
            interactive: true,
            answer,
            questions: Vec::new(),
        }
    }

    fn detached() -> Self {
        Self {
            interactive: false,
            answer: "",
            questions: Vec::new(),
        }
    }
}

impl Prompt for FakePrompt {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn ask(&mut self, question: &str) -> CliResult<String> {
        self.questions.push(question.to_string());
        Ok(self.answer.to_string())
    }
}

fn paid_args() -> BoundArgs {
    BoundArgs::new("startCompute")
        .with_value("datasetDids", r#"["did:op:aaa"]"#)
        .with_value("algoDid", "did:op:bbb")
        .with_value("computeEnvId", "env-1")
        .with_value("maxJobDuration", "900")
        .with_value("paymentToken", TOKEN)
        .with_value("resources", r#"[{"id":"cpu","amount":1}]"#)
}

#[tokio::test]
async fn test_missing_parameters_make_no_remote_call() {
    let mut backend = FakeBackend::quoting("1");
    let mut prompt = FakePrompt::answering("y");
    let args = BoundArgs::new("startCompute").with_value("algoDid", "did:op:bbb");

    let err = start_paid_compute(&mut backend, &mut prompt, &args)
        .await
        .unwrap_err();

    match err {
        CliError::MissingArgument { missing, .. } => assert_eq!(
            missing,
            vec![
                "datasetDids",
                "computeEnvId",
                "maxJobDuration",
                "paymentToken",
                "resources"
            ]
        ),
        other => panic!("expected MissingArgument, got {:?}", other),
    }
    assert!(backend.calls.is_empty());
    assert!(prompt.questions.is_empty());
}

#[tokio::test]
async fn test_declined_payment_never_starts() {
    let mut backend = FakeBackend::quoting("1500000000000000000");
    let mut prompt = FakePrompt::answering("no");

    let outcome = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap();

    assert_eq!(outcome, ComputeOutcome::Cancelled);
    assert_eq!(backend.calls, vec!["initialize", "token_decimals"]);
    assert_eq!(prompt.questions.len(), 1);
    assert!(prompt.questions[0].contains("1.5"));
}

#[tokio::test]
async fn test_confirmed_payment_starts_with_the_quote() {
    let mut backend = FakeBackend::quoting("2000000000000000000");
    let mut prompt = FakePrompt::answering("YES");

    let outcome = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap();

    match outcome {
        ComputeOutcome::Started(handle) => {
            assert_eq!(handle.job_id, "0xjob1");
            assert_eq!(handle.agreement_id.as_deref(), Some("0xagreement"));
            assert_eq!(handle.dataset_dids, vec!["did:op:aaa"]);
            assert_eq!(handle.environment_id, "env-1");
        }
        other => panic!("expected a started job, got {:?}", other),
    }
    assert_eq!(backend.calls, vec!["initialize", "token_decimals", "start"]);
    assert_eq!(
        backend.started_with_quote.as_deref(),
        Some("2000000000000000000")
    );
}

#[tokio::test]
async fn test_accept_flag_skips_the_question() {
    let mut backend = FakeBackend::quoting("1");
    let mut prompt = FakePrompt::detached();
    let args = paid_args().with_flag("accept", true);

    let outcome = start_paid_compute(&mut backend, &mut prompt, &args)
        .await
        .unwrap();

    assert!(matches!(outcome, ComputeOutcome::Started(_)));
    assert!(prompt.questions.is_empty());
}

#[tokio::test]
async fn test_no_interactive_channel_fails_without_starting() {
    let mut backend = FakeBackend::quoting("1");
    let mut prompt = FakePrompt::detached();

    let err = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::NonInteractiveConfirmation));
    assert!(!backend.calls.contains(&"start"));
}

#[tokio::test]
async fn test_unusable_initialize_response() {
    let mut backend = FakeBackend::default();
    let mut prompt = FakePrompt::answering("y");
    let err = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Initialization(_)));

    let mut backend = FakeBackend::quoting("1");
    if let Some(response) = backend.initialize_response.as_mut() {
        response.payment = None;
    }
    let err = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Initialization(_)));
    assert!(prompt.questions.is_empty());
}

#[tokio::test]
async fn test_empty_job_list_is_a_start_error() {
    let mut backend = FakeBackend::quoting("1");
    backend.jobs.clear();
    let mut prompt = FakePrompt::answering("y");

    let err = start_paid_compute(&mut backend, &mut prompt, &paid_args())
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::Start(_)));
}

#[tokio::test]
async fn test_free_compute_from_a_command_line() {
    let registry = build_registry().unwrap();
    let tokens = tokenize(r#"startFreeCompute '["did:op:aaa"]' did:op:bbb env-1"#).unwrap();
    let descriptor = registry.resolve(&tokens[0]).unwrap();
    let (positionals, options) = split_arguments(descriptor, &tokens[1..]).unwrap();
    let args = registry.bind(descriptor, positionals, options).unwrap();
    let request = FreeComputeRequest::from_args(&args).unwrap();

    let mut backend = FakeBackend {
        jobs: vec![job("a1b2c3d4e5f6", None)],
        ..Default::default()
    };
    let outcome = run_free_compute(&mut backend, &request).await.unwrap();

    assert_eq!(backend.calls, vec!["start_free"]);
    match outcome {
        ComputeOutcome::Started(handle) => {
            let line = handle.to_string();
            assert!(line.starts_with("Compute started. JobID: "));
            let job_id = line.trim_start_matches("Compute started. JobID: ");
            assert!(!job_id.is_empty());
            assert!(job_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            assert!(handle.agreement_id.is_none());
        }
        other => panic!("expected a started job, got {:?}", other),
    }
}

fn settings_for(server: &MockServer) -> Settings {
    Settings {
        credential: Credential::PrivateKey(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
        ),
        rpc_url: server.base_url().parse().unwrap(),
        node_url: server.base_url().parse().unwrap(),
        address_file: None,
        avoid_loop_run: true,
    }
}

async fn run_against_silent_server(line: &[&str]) -> CliResult<()> {
    let server = MockServer::start_async().await;
    let posts = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500);
        })
        .await;
    let gets = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(500);
        })
        .await;

    let registry = build_registry().unwrap();
    let command = registry.resolve(line[0]).unwrap();
    let tokens = words(&line[1..]);
    let (positionals, options) = split_arguments(command, &tokens).unwrap();
    let args = registry.bind(command, positionals, options).unwrap();

    let mut runner = CommandRunner::new(
        settings_for(&server),
        node_for(&server),
        Box::new(FakePrompt::answering("y")),
    );
    let result = runner.execute(&registry, command, args).await;

    posts.assert_calls_async(0).await;
    gets.assert_calls_async(0).await;
    result
}

#[tokio::test]
async fn test_empty_paid_compute_lists_fail_before_any_rpc_call() {
    let err = run_against_silent_server(&[
        "startCompute",
        "[]",
        "did:op:bbb",
        "env-1",
        "60",
        TOKEN,
        "[]",
    ])
    .await
    .unwrap_err();

    match err {
        CliError::MissingArgument { missing, .. } => {
            assert_eq!(missing, vec!["datasetDids", "resources"])
        }
        other => panic!("expected MissingArgument, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_paid_compute_duration_fails_before_any_rpc_call() {
    let err = run_against_silent_server(&[
        "startCompute",
        "did:op:aaa",
        "did:op:bbb",
        "env-1",
        "soon",
        TOKEN,
        "[{\"id\":\"cpu\",\"amount\":1}]",
    ])
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_empty_free_compute_datasets_fail_before_any_rpc_call() {
    let err = run_against_silent_server(&["startFreeCompute", "[]", "did:op:bbb", "env-1"])
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::MissingArgument { .. }));
}

// ---------------------------------------------------------------------------
// Node HTTP client
// ---------------------------------------------------------------------------

fn node_for(server: &MockServer) -> NodeClient {
    NodeClient::new(server.base_url().parse().unwrap())
}

#[tokio::test]
async fn test_resolve_ddo() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/aquarius/assets/ddo/did:op:aaa");
            then.status(200).json_body(serde_json::json!({
                "id": "did:op:aaa",
                "chainId": 8996,
                "nftAddress": "0x1111111111111111111111111111111111111111",
                "metadata": {"type": "algorithm", "name": "sum"},
                "services": [{"id": "svc-1", "type": "compute", "files": "0xdead"}]
            }));
        })
        .await;

    let ddo = node_for(&server).resolve_ddo("did:op:aaa").await.unwrap();

    mock.assert_async().await;
    assert_eq!(ddo.id, "did:op:aaa");
    assert!(ddo.is_algorithm());
    assert_eq!(ddo.compute_service().unwrap().id, "svc-1");
}

#[tokio::test]
async fn test_error_status_becomes_remote_service_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/services/computeEnvironments");
            then.status(503).body("node busy");
        })
        .await;

    let err = node_for(&server).compute_environments().await.unwrap_err();

    match err {
        CliError::RemoteService { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "node busy");
        }
        other => panic!("expected RemoteService, got {:?}", other),
    }
}

#[tokio::test]
async fn test_null_initialize_answer_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/services/initializeCompute");
            then.status(200).body("null");
        })
        .await;

    let request = serde_json::from_value(serde_json::json!({
        "datasets": [{"documentId": "did:op:aaa", "serviceId": "svc-1"}],
        "algorithm": {"documentId": "did:op:bbb", "serviceId": "svc-2"},
        "environment": "env-1",
        "payment": {"chainId": 8996, "token": TOKEN, "resources": []},
        "maxJobDuration": 60,
        "consumerAddress": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    }))
    .unwrap();

    let answer = node_for(&server).initialize_compute(&request).await.unwrap();
    assert!(answer.is_none());
}

#[tokio::test]
async fn test_next_nonce_and_job_status_queries() {
    let server = MockServer::start_async().await;
    let nonce = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/services/nonce")
                .query_param("userAddress", "0xabc");
            then.status(200).json_body(serde_json::json!({ "nonce": 41 }));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/services/compute")
                .query_param("consumerAddress", "0xabc")
                .query_param("jobId", "job-1")
                .query_param("agreementId", "0xagr");
            then.status(200).json_body(serde_json::json!([{
                "jobId": "job-1",
                "status": 40,
                "statusText": "Running algorithm"
            }]));
        })
        .await;

    let node = node_for(&server);
    assert_eq!(node.next_nonce("0xabc").await.unwrap(), "42");
    let jobs = node
        .compute_status("0xabc", "job-1", Some("0xagr"))
        .await
        .unwrap();

    nonce.assert_async().await;
    status.assert_async().await;
    assert_eq!(jobs[0].status_text.as_deref(), Some("Running algorithm"));
}

#[tokio::test]
async fn test_malformed_or_exhausted_nonce_is_a_remote_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/services/nonce")
                .query_param("userAddress", "0xbad");
            then.status(200).json_body(serde_json::json!({ "nonce": "not-a-number" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/services/nonce")
                .query_param("userAddress", "0xmax");
            then.status(200)
                .json_body(serde_json::json!({ "nonce": u64::MAX.to_string() }));
        })
        .await;

    let node = node_for(&server);
    for address in ["0xbad", "0xmax"] {
        match node.next_nonce(address).await {
            Err(CliError::RemoteService { message, .. }) => assert!(message.contains("nonce")),
            other => panic!("{}: expected RemoteService, got {:?}", address, other),
        }
    }
}

#[tokio::test]
async fn test_base_path_is_kept() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/ocean/api/services/computeEnvironments");
            then.status(200)
                .json_body(serde_json::json!([{ "id": "env-1", "resources": [{"id": "cpu"}] }]));
        })
        .await;

    let node = NodeClient::new(server.url("/ocean").parse().unwrap());
    let environments = node.compute_environments().await.unwrap();

    mock.assert_async().await;
    assert_eq!(environments[0].id, "env-1");
}

#[tokio::test]
async fn test_save_response_uses_announced_name() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/file");
            then.status(200)
                .header("content-disposition", "attachment; filename=\"out.txt\"")
                .body("hello");
        })
        .await;

    let response = reqwest::get(server.url("/file")).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = save_response(response, dir.path(), "fallback").await.unwrap();

    assert_eq!(path, dir.path().join("out.txt"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

const ENV_VARS: [&str; 6] = [
    "PRIVATE_KEY",
    "MNEMONIC",
    "RPC",
    "NODE_URL",
    "ADDRESS_FILE",
    "AVOID_LOOP_RUN",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_missing_rpc_is_named() {
    clear_env();
    std::env::set_var(
        "PRIVATE_KEY",
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    );
    std::env::set_var("NODE_URL", "http://localhost:8000");

    let err = Settings::from_env().unwrap_err();
    clear_env();

    assert!(matches!(err, CliError::Configuration(_)));
    assert!(err.to_string().contains("RPC"));
}

#[test]
#[serial]
fn test_env_complete() {
    clear_env();
    std::env::set_var(
        "MNEMONIC",
        "test test test test test test test test test test test junk",
    );
    std::env::set_var("RPC", "http://localhost:8545");
    std::env::set_var("NODE_URL", "http://localhost:8000");
    std::env::set_var("AVOID_LOOP_RUN", "true");

    let settings = Settings::from_env();
    clear_env();

    let settings = settings.unwrap();
    assert!(settings.avoid_loop_run);
    assert_eq!(settings.rpc_url.as_str(), "http://localhost:8545/");
}
