use async_trait::async_trait;

use super::args::ParameterSpec;
use super::registry::{Command, CommandDescriptor, CommandInput, Registry};
use crate::error::CliResult;
use crate::output::Output;

/// Extra columns between the longest command name and the descriptions.
const NAME_PADDING: usize = 4;

const PARAMETERS: &[ParameterSpec] = &[ParameterSpec::value(
    "command",
    "<command>",
    "Show the parameters of a single command",
)];

pub fn descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "help",
        description: "Display the description for all NPL CLI commands",
        parameters: PARAMETERS,
        env_variables: &[],
        hidden: false,
        factory: build,
    }
}

fn build(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    let lines = match input.args.value("command") {
        Some(name) => command_usage(input.registry.resolve(name)?),
        None => command_listing(input.registry.visible()),
    };
    Ok(Box::new(PrintLines {
        lines,
        output: input.context.output.clone(),
    }))
}

/// One line per command: name padded to the longest name plus four, then the description.
pub fn command_listing<'a>(commands: impl Iterator<Item = &'a CommandDescriptor>) -> Vec<String> {
    let commands: Vec<&CommandDescriptor> = commands.collect();
    let width = commands
        .iter()
        .map(|c| c.command_name.chars().count())
        .max()
        .unwrap_or(0)
        + NAME_PADDING;

    commands
        .iter()
        .map(|c| format!("{:<width$}{}", c.command_name, c.description, width = width))
        .collect()
}

/// Usage block for a single command: usage line, parameters and environment variables.
pub fn command_usage(descriptor: &CommandDescriptor) -> Vec<String> {
    let mut lines = vec![format!("Usage: {}", descriptor.usage())];

    let params: Vec<_> = descriptor.parameters.iter().filter(|p| !p.is_hidden).collect();
    if !params.is_empty() {
        lines.push(String::new());
        lines.push("Parameters:".to_string());
        let width = params.iter().map(|p| p.usage().len()).max().unwrap_or(0) + NAME_PADDING;
        for param in params {
            let mut line = format!("  {:<width$}{}", param.usage(), param.description, width = width);
            if let Some(default) = param.default_value {
                line.push_str(&format!(" (default: {})", default));
            }
            lines.push(line);
        }
    }

    if !descriptor.env_variables.is_empty() {
        lines.push(String::new());
        lines.push("Environment variables:".to_string());
        for var in descriptor.env_variables {
            lines.push(format!("  {}  {}", var.name, var.description));
        }
    }

    lines
}

/// Listing of a command group's subcommands with their usage.
pub fn group_listing(registry: &Registry, group: &str) -> Vec<String> {
    let mut lines = vec![format!("Usage: npl {} <command> [--flag [value]]...", group)];
    lines.push(String::new());
    lines.extend(command_listing(registry.subcommands(group)));
    lines
}

/// Writes precomputed text; backs `help` and the bare `cloud` group.
pub(crate) struct PrintLines {
    pub(crate) lines: Vec<String>,
    pub(crate) output: Output,
}

#[async_trait]
impl Command for PrintLines {
    async fn execute(&self) -> anyhow::Result<()> {
        for line in &self.lines {
            self.output.line(line);
        }
        Ok(())
    }
}
