use crate::console::LineReader;
use crate::input::{split_arguments, tokenize};
use crate::registry::{BoundArgs, CommandDescriptor, CommandRegistry};
use async_trait::async_trait;
use ocean_cli_shared::{CliError, CliResult};
use tracing::{error, info, warn};

pub const PROMPT: &str = "ocean> ";
pub const EXIT_TOKENS: [&str; 3] = ["exit", "quit", "\\q"];

/// Runs one bound command to completion
#[async_trait]
pub trait Executor: Send {
    async fn execute(
        &mut self,
        registry: &CommandRegistry,
        command: &CommandDescriptor,
        args: BoundArgs,
    ) -> CliResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Run the initial command, then keep prompting
    Interactive,
    /// Run the initial command only
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingInput,
    Executing,
    Terminated,
}

/// What a line of input asks for
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Exit,
    Command(Vec<String>),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
    /// Error of the most recent command, cleared when a command succeeds
    pub last_failure: Option<CliError>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        match &self.last_failure {
            Some(err) if err.is_fatal_for_process() => 1,
            _ => 0,
        }
    }
}

/// Reads command lines and executes them strictly one after another
pub struct Dispatcher<'r, R, E> {
    registry: &'r CommandRegistry,
    reader: R,
    executor: E,
    mode: LoopMode,
    state: DispatchState,
    summary: RunSummary,
}

impl<'r, R: LineReader, E: Executor> Dispatcher<'r, R, E> {
    pub fn new(registry: &'r CommandRegistry, reader: R, executor: E, mode: LoopMode) -> Self {
        Self {
            registry,
            reader,
            executor,
            mode,
            state: DispatchState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Execute `initial` (the process arguments) once, then loop on the
    /// reader unless running one-shot.
    pub async fn run(mut self, initial: Vec<String>) -> RunSummary {
        self.run_initial(initial).await;

        while self.state != DispatchState::Terminated {
            self.state = DispatchState::AwaitingInput;
            let Some(line) = self.reader.read_line(PROMPT) else {
                self.state = DispatchState::Terminated;
                break;
            };

            match classify(&line) {
                Ok(Input::Empty) => continue,
                Ok(Input::Exit) => self.state = DispatchState::Terminated,
                Ok(Input::Command(tokens)) => {
                    if self.registry.contains(&tokens[0]) {
                        self.dispatch(tokens).await;
                    } else {
                        warn!("Invalid option: {} (type 'help' to list commands)", tokens[0]);
                    }
                }
                Err(e) => warn!("Could not read command: {}", e),
            }
        }

        info!("👋 Bye");
        self.summary
    }

    async fn run_initial(&mut self, initial: Vec<String>) {
        let tokens = if initial.is_empty() {
            match self.mode {
                LoopMode::OneShot => vec!["help".to_string()],
                LoopMode::Interactive => Vec::new(),
            }
        } else {
            initial
        };

        if let Some(first) = tokens.first() {
            if EXIT_TOKENS.contains(&first.as_str()) {
                self.state = DispatchState::Terminated;
                return;
            }
            // A failing initial command is logged and the loop still starts.
            // Whether this should abort instead is an open question.
            self.dispatch(tokens).await;
        }

        if self.mode == LoopMode::OneShot {
            self.state = DispatchState::Terminated;
        }
    }

    async fn dispatch(&mut self, tokens: Vec<String>) {
        self.state = DispatchState::Executing;
        let name = tokens[0].clone();

        match self.execute_tokens(&tokens).await {
            Ok(()) => {
                self.summary.executed += 1;
                self.summary.last_failure = None;
            }
            Err(e) => {
                match &e {
                    CliError::UnknownCommand(token) => warn!("Invalid option: {}", token),
                    other => error!("{} failed: {}", name, other),
                }
                self.summary.executed += 1;
                self.summary.failed += 1;
                self.summary.last_failure = Some(e);
            }
        }

        if self.state == DispatchState::Executing {
            self.state = DispatchState::Idle;
        }
    }

    async fn execute_tokens(&mut self, tokens: &[String]) -> CliResult<()> {
        let registry = self.registry;
        let command = registry.resolve(&tokens[0])?;
        let (positionals, options) = split_arguments(command, &tokens[1..])?;
        let args = registry.bind(command, positionals, options)?;
        self.executor.execute(registry, command, args).await
    }
}

fn classify(line: &str) -> CliResult<Input> {
    let tokens = tokenize(line)?;
    match tokens.first() {
        None => Ok(Input::Empty),
        Some(first) if EXIT_TOKENS.contains(&first.as_str()) => Ok(Input::Exit),
        Some(_) => Ok(Input::Command(tokens)),
    }
}
