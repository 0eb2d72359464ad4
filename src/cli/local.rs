//! `npl deploy`: package the sources and push them to a locally running engine.

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::args::ParameterSpec;
use super::registry::{Command, CommandDescriptor, CommandInput};
use crate::api::{DeploymentClient, DeploymentTarget};
use crate::build::zip_directory;
use crate::config::LocalSettings;
use crate::error::{CliError, CliResult};
use crate::login::{OidcClient, OidcEndpoints};
use crate::output::Output;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::value("management-url", "<url>", "Management API of the engine")
        .config("local.managementUrl")
        .default("http://localhost:12400"),
    ParameterSpec::value("auth-url", "<url>", "Keycloak server of the engine")
        .config("local.authUrl")
        .default("http://localhost:11000"),
    ParameterSpec::value("app", "<app>", "Application, also the Keycloak realm")
        .config("local.app")
        .default("noumena"),
    ParameterSpec::value("username", "<username>", "User to deploy as")
        .required()
        .config("local.username"),
    ParameterSpec::value("password", "<password>", "Password of the user")
        .required()
        .config("local.password"),
    ParameterSpec::value("client-id", "<id>", "OAuth client of the realm")
        .config("local.clientId")
        .default("noumena"),
    ParameterSpec::value("client-secret", "<secret>", "Secret of the OAuth client")
        .config("local.clientSecret"),
    ParameterSpec::value("source-dir", "<directory>", "Directory containing the NPL sources")
        .path()
        .config("local.sourceDir")
        .default(crate::config::DEFAULT_SOURCE_DIR),
    ParameterSpec::flag("clear", "Remove the deployed application before deploying")
        .config("local.clear"),
];

pub fn deploy_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "deploy",
        description: "Deploy NPL sources to a local engine",
        parameters: PARAMETERS,
        env_variables: &[],
        hidden: false,
        factory: build,
    }
}

fn build(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(LocalDeployCommand {
        settings: LocalSettings::from_args(&input.args)?,
        http: input.context.http.clone(),
        output: input.context.output.clone(),
    }))
}

struct LocalDeployCommand {
    settings: LocalSettings,
    http: Client,
    output: Output,
}

#[async_trait]
impl Command for LocalDeployCommand {
    async fn execute(&self) -> anyhow::Result<()> {
        deploy(&self.settings, &self.http, &self.output).await?;
        Ok(())
    }
}

/// Log in with the password grant, optionally clear, then upload the sources.
pub async fn deploy(settings: &LocalSettings, http: &Client, output: &Output) -> CliResult<()> {
    let archive = zip_directory(&settings.source_dir).map_err(|e| {
        CliError::Command(format!("Failed to package sources: {:#}", e))
    })?;

    let mut oidc = OidcClient::new(
        http.clone(),
        OidcEndpoints::for_realm(&settings.auth_url, &settings.app),
        settings.client_id.clone(),
    );
    if let Some(secret) = &settings.client_secret {
        oidc = oidc.with_client_secret(secret.clone());
    }
    let token = oidc
        .password_grant(&settings.username, &settings.password)
        .await?;

    let client = DeploymentClient::new(
        http.clone(),
        DeploymentTarget::local_engine(&settings.management_url),
    );

    if settings.clear {
        client.clear(&token.access_token).await?;
        output.line("✓ Cleared application");
    }

    client.upload(&token.access_token, &archive).await?;
    info!(app = %settings.app, "Deployed to {}", settings.management_url);
    output.line(format!(
        "✓ Deployed {} to {}",
        settings.source_dir.display(),
        settings.management_url
    ));
    Ok(())
}
