use ocean_cli_shared::{CliError, CliResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Which handler a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Help,
    GetDdo,
    Publish,
    PublishAlgo,
    EditAsset,
    Download,
    AllowAlgo,
    DisallowAlgo,
    StartCompute,
    StartFreeCompute,
    GetComputeEnvironments,
    ComputeStreamableLogs,
    StopCompute,
    GetJobStatus,
    DownloadJobResults,
    MintOcean,
    GenerateAuthToken,
    InvalidateAuthToken,
    DepositEscrow,
    AuthorizeEscrow,
    WithdrawFromEscrow,
    GetUserFundsEscrow,
}

/// Positional parameter, also reachable as `--name` / `-x`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub short: Option<char>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            short: None,
            description,
        }
    }

    pub fn optional(
        name: &'static str,
        default: Option<&'static str>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            required: false,
            default,
            short: None,
            description,
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }
}

/// Standalone boolean flag (`--accept`, `--accept true`, `--accept=false`)
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    pub name: &'static str,
    pub short: Option<char>,
    pub default: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub aliases: Vec<&'static str>,
    pub summary: &'static str,
    pub params: Vec<ParamSpec>,
    pub flags: Vec<FlagSpec>,
    pub handler: Handler,
    /// Handler needs a signer and chain connection
    pub needs_session: bool,
}

impl CommandDescriptor {
    pub fn new(name: &'static str, handler: Handler, summary: &'static str) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            summary,
            params: Vec::new(),
            flags: Vec::new(),
            handler,
            needs_session: false,
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn flag(
        mut self,
        name: &'static str,
        short: Option<char>,
        description: &'static str,
    ) -> Self {
        self.flags.push(FlagSpec {
            name,
            short,
            default: false,
            description,
        });
        self
    }

    pub fn with_session(mut self) -> Self {
        self.needs_session = true;
        self
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    fn find_param(&self, option: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| matches_option(option, p.name, p.short))
    }

    fn find_flag(&self, option: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| matches_option(option, f.name, f.short))
    }

    pub fn takes_value(&self, option: &str) -> Option<bool> {
        if self.find_param(option).is_some() {
            Some(true)
        } else if self.find_flag(option).is_some() {
            Some(false)
        } else {
            None
        }
    }

    /// One-line usage, e.g. `download <did> [folder=.]`
    pub fn usage(&self) -> String {
        let mut usage = self.name.to_string();
        for param in &self.params {
            let _ = match (param.required, param.default) {
                (true, _) => write!(usage, " <{}>", param.name),
                (false, Some(default)) => write!(usage, " [{}={}]", param.name, default),
                (false, None) => write!(usage, " [{}]", param.name),
            };
        }
        for flag in &self.flags {
            let _ = write!(usage, " [--{}]", flag.name);
        }
        usage
    }
}

fn matches_option(option: &str, name: &str, short: Option<char>) -> bool {
    if option == name {
        return true;
    }
    let mut chars = option.chars();
    match (chars.next(), chars.next(), short) {
        (Some(c), None, Some(s)) => c == s,
        _ => false,
    }
}

/// Named option as typed by the user, without leading dashes
#[derive(Debug, Clone, PartialEq)]
pub struct RawOption {
    pub name: String,
    pub value: Option<String>,
}

impl RawOption {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }
}

/// Arguments resolved against a descriptor's parameter list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    command: String,
    values: BTreeMap<String, String>,
    flags: BTreeMap<String, bool>,
}

impl BoundArgs {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.flags.insert(name.to_string(), value);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, name: &str) -> CliResult<&str> {
        self.get(name)
            .ok_or_else(|| CliError::missing(&self.command, vec![name.to_string()]))
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// Static table of commands; filled once at startup, read-only afterwards
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) -> CliResult<()> {
        let mut seen = Vec::new();
        for name in descriptor.names() {
            if self.index.contains_key(name) || seen.contains(&name) {
                return Err(CliError::DuplicateCommand(name.to_string()));
            }
            seen.push(name);
        }

        if let Some(pos) = descriptor.params.iter().position(|p| !p.required) {
            if let Some(late) = descriptor.params[pos..].iter().find(|p| p.required) {
                return Err(CliError::InvalidDescriptor {
                    command: descriptor.name.to_string(),
                    reason: format!(
                        "required parameter '{}' follows an optional one",
                        late.name
                    ),
                });
            }
        }

        let slot = self.commands.len();
        for name in seen {
            self.index.insert(name, slot);
        }
        self.commands.push(descriptor);
        Ok(())
    }

    pub fn resolve(&self, token: &str) -> CliResult<&CommandDescriptor> {
        self.index
            .get(token)
            .map(|&slot| &self.commands[slot])
            .ok_or_else(|| CliError::UnknownCommand(token.to_string()))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    /// Map positional arguments and named options onto the descriptor.
    ///
    /// A named option always wins over the positional argument for the same
    /// slot. Every unsatisfied required parameter is reported at once.
    pub fn bind(
        &self,
        descriptor: &CommandDescriptor,
        raw_args: Vec<String>,
        raw_options: Vec<RawOption>,
    ) -> CliResult<BoundArgs> {
        if raw_args.len() > descriptor.params.len() {
            return Err(CliError::InvalidArgument(format!(
                "{} takes at most {} argument(s), got {}",
                descriptor.name,
                descriptor.params.len(),
                raw_args.len()
            )));
        }

        let mut bound = BoundArgs::new(descriptor.name);
        for (param, value) in descriptor.params.iter().zip(raw_args) {
            bound.values.insert(param.name.to_string(), value);
        }

        for option in raw_options {
            if let Some(param) = descriptor.find_param(&option.name) {
                let value = option.value.ok_or_else(|| {
                    CliError::InvalidArgument(format!("option --{} needs a value", param.name))
                })?;
                bound.values.insert(param.name.to_string(), value);
            } else if let Some(flag) = descriptor.find_flag(&option.name) {
                let value = parse_flag_value(flag.name, option.value.as_deref())?;
                bound.flags.insert(flag.name.to_string(), value);
            } else {
                return Err(CliError::InvalidArgument(format!(
                    "unknown option '{}' for {}",
                    option.name, descriptor.name
                )));
            }
        }

        let mut missing = Vec::new();
        for param in &descriptor.params {
            let present = bound
                .values
                .get(param.name)
                .is_some_and(|v| !v.trim().is_empty());
            if present {
                continue;
            }
            match (param.required, param.default) {
                (true, _) => missing.push(param.name.to_string()),
                (false, Some(default)) => {
                    bound.values.insert(param.name.to_string(), default.to_string());
                }
                (false, None) => {}
            }
        }
        if !missing.is_empty() {
            return Err(CliError::missing(descriptor.name, missing));
        }

        for flag in &descriptor.flags {
            bound.flags.entry(flag.name.to_string()).or_insert(flag.default);
        }

        Ok(bound)
    }

    /// Full command listing, derived only from the registered descriptors
    pub fn render_help(&self) -> String {
        let usages: Vec<String> = self.commands.iter().map(CommandDescriptor::usage).collect();
        let width = usages.iter().map(String::len).max().unwrap_or(0);

        let mut out = String::from("Available commands:\n");
        for (descriptor, usage) in self.commands.iter().zip(&usages) {
            let _ = write!(out, "  {:<width$}  {}", usage, descriptor.summary, width = width);
            if !descriptor.aliases.is_empty() {
                let _ = write!(out, " (aliases: {})", descriptor.aliases.join(", "));
            }
            out.push('\n');
        }
        out.push_str("\nOptions may also be given by name, e.g. --did <value>; named options override positional ones.\n");
        out.push_str("Type 'exit', 'quit' or '\\q' to leave.\n");
        out
    }
}

fn parse_flag_value(name: &str, value: Option<&str>) -> CliResult<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(true),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "y") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "n") => Ok(false),
        Some(v) => Err(CliError::InvalidArgument(format!(
            "flag --{} expects true or false, got '{}'",
            name, v
        ))),
    }
}
