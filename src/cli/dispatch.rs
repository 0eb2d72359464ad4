//! Command dispatch and mapping of failures to exit statuses.

use anyhow::anyhow;
use tracing::{debug, error};

use super::registry::{CommandInput, Registry};
use super::suggest::suggest;
use super::CliContext;
use crate::config::ConfigResolver;
use crate::error::CliError;

/// Process exit status. The numeric codes are part of the CLI's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Authentication, network or command failure
    GeneralError,
    /// Unknown command, bad arguments, missing or invalid parameters
    UsageError,
    /// Anything unexpected, including panics
    InternalError,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::GeneralError => 1,
            ExitStatus::UsageError => 2,
            ExitStatus::InternalError => 3,
        }
    }
}

pub struct Dispatcher {
    registry: Registry,
    resolver: ConfigResolver,
    context: CliContext,
}

impl Dispatcher {
    pub fn new(registry: Registry, resolver: ConfigResolver, context: CliContext) -> Self {
        Self {
            registry,
            resolver,
            context,
        }
    }

    /// Run the command named by `args` and report the outcome.
    ///
    /// An empty argument list behaves like `help`. Every failure writes exactly
    /// one line to the output sink.
    pub async fn execute(&self, args: &[String]) -> ExitStatus {
        let args: Vec<String> = if args.is_empty() {
            vec!["help".to_string()]
        } else {
            args.to_vec()
        };

        let status = match self.run(&args).await {
            Ok(()) => ExitStatus::Success,
            Err(err) => {
                let (status, message) = self.classify(&err);
                debug!(?status, "Command failed: {:?}", err);
                self.context.output.line(message);
                status
            }
        };

        self.context.output.flush();
        status
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        let (descriptor, rest) = self.registry.resolve_args(args)?;
        debug!(command = descriptor.command_name, args = ?rest, "Dispatching");

        let resolved = self.resolver.resolve(rest, descriptor)?;
        let command = (descriptor.factory)(CommandInput {
            args: resolved,
            context: &self.context,
            registry: &self.registry,
        })?;

        // A panicking command must still produce a classified exit status
        let handle = tokio::spawn(async move { command.execute().await });
        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(anyhow!("Command aborted: {}", join_error)),
        }
    }

    /// Exit status and the one-line message for a failure.
    pub fn classify(&self, err: &anyhow::Error) -> (ExitStatus, String) {
        let Some(cli_error) = err.chain().find_map(|e| e.downcast_ref::<CliError>()) else {
            error!("Unexpected failure: {:?}", err);
            return (
                ExitStatus::InternalError,
                format!("Unexpected error: {:#}", err),
            );
        };

        match cli_error {
            CliError::CommandNotFound { name } => {
                let message = match suggest(name, self.registry.names()) {
                    Some(suggestion) => {
                        format!("{}. Did you mean '{}'?", cli_error, suggestion)
                    }
                    None => format!("{}. Run 'npl help' to list commands.", cli_error),
                };
                (ExitStatus::UsageError, message)
            }
            e if e.is_usage_error() => (ExitStatus::UsageError, e.to_string()),
            _ => (ExitStatus::GeneralError, format!("Error: {:#}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::registry::{tests::descriptor, Command, CommandDescriptor};
    use crate::cli::{commands, CliContext};
    use crate::config::{ConfigFile, TokenStore};
    use crate::error::CliResult;
    use crate::output::{CapturedOutput, Output};
    use async_trait::async_trait;

    fn context(output: Output) -> CliContext {
        CliContext {
            output,
            http: reqwest::Client::new(),
            token_store: Some(TokenStore::new(
                std::env::temp_dir().join("npl-test-never-written.json"),
            )),
            service_account_secret: None,
            open_browser: false,
        }
    }

    fn dispatcher_with(registry: Registry) -> (Dispatcher, CapturedOutput) {
        let (output, captured) = Output::buffer();
        let dispatcher = Dispatcher::new(
            registry,
            ConfigResolver::new(ConfigFile::empty()),
            context(output),
        );
        (dispatcher, captured)
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unknown_command_suggests_closest() {
        let (dispatcher, captured) = dispatcher_with(Registry::new(vec![
            descriptor("version"),
            descriptor("help"),
            descriptor("check"),
        ]));

        let status = dispatcher.execute(&args(&["vers"])).await;

        assert_eq!(status, ExitStatus::UsageError);
        assert_eq!(
            captured.contents(),
            "Command not supported: 'vers'. Did you mean 'version'?\n"
        );
    }

    #[tokio::test]
    async fn test_local_commands_do_not_resolve_token_store() {
        let (output, captured) = Output::buffer();
        let dispatcher = Dispatcher::new(
            commands(),
            ConfigResolver::new(ConfigFile::empty()),
            CliContext {
                token_store: None,
                ..context(output)
            },
        );

        assert_eq!(dispatcher.execute(&args(&["version"])).await, ExitStatus::Success);
        assert!(captured.contents().starts_with("NPL CLI "));
    }

    #[tokio::test]
    async fn test_unknown_command_without_suggestion() {
        let (dispatcher, captured) = dispatcher_with(Registry::new(vec![descriptor("version")]));
        let status = dispatcher.execute(&args(&["frobnicate"])).await;
        assert_eq!(status, ExitStatus::UsageError);
        assert_eq!(
            captured.contents(),
            "Command not supported: 'frobnicate'. Run 'npl help' to list commands.\n"
        );
    }

    #[tokio::test]
    async fn test_no_arguments_behaves_like_help() {
        let (dispatcher, without_args) = dispatcher_with(commands());
        assert_eq!(dispatcher.execute(&[]).await, ExitStatus::Success);

        let (dispatcher, with_help) = dispatcher_with(commands());
        assert_eq!(dispatcher.execute(&args(&["help"])).await, ExitStatus::Success);

        assert!(!without_args.contents().is_empty());
        assert_eq!(without_args.contents(), with_help.contents());
    }

    #[tokio::test]
    async fn test_help_for_single_command() {
        let (dispatcher, captured) = dispatcher_with(commands());
        let status = dispatcher
            .execute(&args(&["help", "--command", "cloud deploy"]))
            .await;
        assert_eq!(status, ExitStatus::Success);
        let text = captured.contents();
        assert!(text.starts_with("Usage: npl cloud deploy --app <app> --tenant <tenant>"));
        assert!(text.contains("NPL_SERVICE_ACCOUNT_CLIENT_SECRET"));

        let (dispatcher, captured) = dispatcher_with(commands());
        let status = dispatcher.execute(&args(&["help", "--command", "chek"])).await;
        assert_eq!(status, ExitStatus::UsageError);
        assert_eq!(
            captured.contents(),
            "Command not supported: 'chek'. Did you mean 'check'?\n"
        );
    }

    #[tokio::test]
    async fn test_cloud_deploy_missing_app_and_tenant() {
        let (dispatcher, captured) = dispatcher_with(commands());

        let status = dispatcher.execute(&args(&["cloud", "deploy"])).await;

        assert_eq!(status, ExitStatus::UsageError);
        let text = captured.contents();
        assert!(
            text.starts_with("Missing required parameters: app, tenant."),
            "got {text}"
        );
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_arguments_are_usage_errors() {
        let (dispatcher, captured) = dispatcher_with(commands());
        let status = dispatcher.execute(&args(&["version", "--bogus"])).await;
        assert_eq!(status, ExitStatus::UsageError);
        assert_eq!(
            captured.contents(),
            "Unexpected arguments for command 'version': --bogus\n"
        );
    }

    struct Failing(fn() -> anyhow::Result<()>);

    #[async_trait]
    impl Command for Failing {
        async fn execute(&self) -> anyhow::Result<()> {
            (self.0)()
        }
    }

    fn rest_failure(_: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
        Ok(Box::new(Failing(|| {
            Err(CliError::rest_call(
                "Upload archive",
                reqwest::StatusCode::BAD_GATEWAY,
                "upstream down".to_string(),
            )
            .into())
        })))
    }

    fn unexpected_failure(_: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
        Ok(Box::new(Failing(|| Err(anyhow!("disk on fire")))))
    }

    fn panicking(_: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
        Ok(Box::new(Failing(|| panic!("boom"))))
    }

    fn failing_registry() -> Registry {
        Registry::new(vec![
            CommandDescriptor {
                factory: rest_failure,
                ..descriptor("upload")
            },
            CommandDescriptor {
                factory: unexpected_failure,
                ..descriptor("oops")
            },
            CommandDescriptor {
                factory: panicking,
                ..descriptor("panic")
            },
        ])
    }

    #[tokio::test]
    async fn test_rest_failure_is_general_error() {
        let (dispatcher, captured) = dispatcher_with(failing_registry());
        assert_eq!(
            dispatcher.execute(&args(&["upload"])).await,
            ExitStatus::GeneralError
        );
        assert_eq!(
            captured.contents(),
            "Error: Upload archive failed with status 502 Bad Gateway: upstream down\n"
        );
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_internal_error() {
        let (dispatcher, captured) = dispatcher_with(failing_registry());
        assert_eq!(
            dispatcher.execute(&args(&["oops"])).await,
            ExitStatus::InternalError
        );
        assert_eq!(captured.contents(), "Unexpected error: disk on fire\n");
    }

    #[tokio::test]
    async fn test_panic_is_internal_error() {
        let (dispatcher, captured) = dispatcher_with(failing_registry());
        assert_eq!(
            dispatcher.execute(&args(&["panic"])).await,
            ExitStatus::InternalError
        );
        assert_eq!(captured.contents().lines().count(), 1);
        assert!(captured.contents().starts_with("Unexpected error: Command aborted"));
    }

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::GeneralError.code(), 1);
        assert_eq!(ExitStatus::UsageError.code(), 2);
        assert_eq!(ExitStatus::InternalError.code(), 3);
    }
}
