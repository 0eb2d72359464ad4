use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::args::ParameterSpec;
use super::registry::{Command, CommandDescriptor, CommandInput};
use crate::build::find_files_with_extension;
use crate::config::StructureSettings;
use crate::error::{CliError, CliResult};
use crate::output::Output;

const NPL_EXTENSION: &str = "npl";

const SOURCE_DIR: ParameterSpec =
    ParameterSpec::value("source-dir", "<directory>", "Directory containing the NPL sources")
        .path()
        .config("structure.sourceDir")
        .default(crate::config::DEFAULT_SOURCE_DIR);

const PARAMETERS: &[ParameterSpec] = &[SOURCE_DIR];

pub fn descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "check",
        description: "Validate the NPL source tree before deploying it",
        parameters: PARAMETERS,
        env_variables: &[],
        hidden: false,
        factory: build,
    }
}

fn build(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(CheckCommand {
        settings: StructureSettings::from_args(&input.args),
        output: input.context.output.clone(),
    }))
}

struct CheckCommand {
    settings: StructureSettings,
    output: Output,
}

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self) -> anyhow::Result<()> {
        let files = check_sources(&self.settings.source_dir)?;
        self.output.line(format!(
            "✓ {} NPL file(s) found in {}",
            files.len(),
            self.settings.source_dir.display()
        ));
        Ok(())
    }
}

/// Every `.npl` file below `source_dir`, after checking each one is readable,
/// valid UTF-8 and not empty.
pub fn check_sources(source_dir: &Path) -> CliResult<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(CliError::Command(format!(
            "Source directory '{}' does not exist",
            source_dir.display()
        )));
    }

    let files = find_files_with_extension(source_dir, NPL_EXTENSION)
        .map_err(|e| CliError::Command(format!("{:#}", e)))?;
    if files.is_empty() {
        return Err(CliError::Command(format!(
            "No NPL sources found in '{}'",
            source_dir.display()
        )));
    }

    for file in &files {
        let bytes = std::fs::read(file).map_err(|e| {
            CliError::Command(format!("Cannot read '{}': {}", file.display(), e))
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            CliError::Command(format!("'{}' is not valid UTF-8", file.display()))
        })?;
        if text.trim().is_empty() {
            return Err(CliError::Command(format!("'{}' is empty", file.display())));
        }
        debug!(file = %file.display(), bytes = text.len(), "Checked source");
    }

    Ok(files)
}
