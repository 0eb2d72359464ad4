//! Static command descriptors and name resolution.

use async_trait::async_trait;

use super::args::{ParameterSpec, FLAG_PREFIX};
use super::CliContext;
use crate::config::ResolvedArgs;
use crate::error::{CliError, CliResult};

/// An executable command instance, built by a descriptor's factory.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(&self) -> anyhow::Result<()>;
}

/// Everything a factory needs to build a command instance.
pub struct CommandInput<'a> {
    pub args: ResolvedArgs,
    pub context: &'a CliContext,
    pub registry: &'a Registry,
}

pub type CommandFactory = fn(CommandInput<'_>) -> CliResult<Box<dyn Command>>;

/// Environment variable a command reads, listed in its usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvVarSpec {
    pub name: &'static str,
    pub description: &'static str,
}

pub struct CommandDescriptor {
    pub command_name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
    pub env_variables: &'static [EnvVarSpec],
    pub hidden: bool,
    pub factory: CommandFactory,
}

impl CommandDescriptor {
    /// One-line usage hint, e.g. `npl cloud clear --app <app> [--url <url>]`.
    pub fn usage(&self) -> String {
        let mut usage = format!("npl {}", self.command_name);
        for param in self.parameters.iter().filter(|p| !p.is_hidden) {
            usage.push(' ');
            usage.push_str(&param.usage());
        }
        usage
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("command_name", &self.command_name)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

/// Ordered set of commands; registration order is the help order.
#[derive(Debug, Default)]
pub struct Registry {
    commands: Vec<CommandDescriptor>,
}

impl Registry {
    pub fn new(commands: Vec<CommandDescriptor>) -> Self {
        Self { commands }
    }

    /// Case-insensitive lookup of a full command name (`"cloud deploy"`).
    pub fn resolve(&self, name: &str) -> CliResult<&CommandDescriptor> {
        self.commands
            .iter()
            .find(|c| c.command_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CliError::CommandNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve the command named by the leading tokens of `args`.
    ///
    /// If the first token is a command group (`cloud`) and is followed by a
    /// non-flag token, the two tokens together form the command name. Returns the
    /// descriptor and the remaining arguments.
    pub fn resolve_args<'a>(
        &self,
        args: &'a [String],
    ) -> CliResult<(&CommandDescriptor, &'a [String])> {
        let Some(first) = args.first() else {
            return Err(CliError::CommandNotFound {
                name: String::new(),
            });
        };

        if let Some(next) = args.get(1).filter(|t| !t.starts_with(FLAG_PREFIX)) {
            if self.is_group(first) {
                let compound = format!("{} {}", first, next);
                return self.resolve(&compound).map(|d| (d, &args[2..]));
            }
        }

        self.resolve(first).map(|d| (d, &args[1..]))
    }

    /// Whether any registered command is nested under `name`.
    pub fn is_group(&self, name: &str) -> bool {
        let prefix = format!("{} ", name.to_lowercase());
        self.commands
            .iter()
            .any(|c| c.command_name.to_lowercase().starts_with(&prefix))
    }

    /// Direct subcommands of a group, in registration order.
    pub fn subcommands<'a>(&'a self, group: &str) -> impl Iterator<Item = &'a CommandDescriptor> {
        let prefix = format!("{} ", group.to_lowercase());
        self.commands
            .iter()
            .filter(move |c| !c.hidden && c.command_name.to_lowercase().starts_with(&prefix))
    }

    /// Commands shown in help, in registration order.
    pub fn visible(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter().filter(|c| !c.hidden)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|c| c.command_name)
    }
}
