use async_trait::async_trait;
use tracing::debug;

use super::registry::{Command, CommandDescriptor, CommandInput};
use crate::error::CliResult;
use crate::output::Output;

pub fn descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "version",
        description: "Display the current version of the NPL CLI",
        parameters: &[],
        env_variables: &[],
        hidden: false,
        factory: build,
    }
}

fn build(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(VersionCommand {
        output: input.context.output.clone(),
    }))
}

struct VersionCommand {
    output: Output,
}

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self) -> anyhow::Result<()> {
        let version = env!("CARGO_PKG_VERSION");
        debug!(version, "Printing CLI version");
        self.output.line(format!("NPL CLI {}", version));
        Ok(())
    }
}
