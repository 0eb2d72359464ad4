//! `npl cloud ...`: login, logout, deploy and clear against NOUMENA Cloud.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::args::ParameterSpec;
use super::help::{group_listing, PrintLines};
use super::registry::{Command, CommandDescriptor, CommandInput, EnvVarSpec};
use super::CliContext;
use crate::api::tenants::resolve_application_id;
use crate::api::{DeploymentClient, DeploymentTarget};
use crate::build::zip_directory;
use crate::config::{CloudAuthSettings, CloudSettings, StoredToken, TokenStore};
use crate::error::{CliError, CliResult};
use crate::login::token_utils::format_token_expiration;
use crate::login::{
    AuthManager, DeviceAuthorization, OidcClient, OidcEndpoints, SERVICE_ACCOUNT_SECRET_VAR,
};
use crate::output::Output;

const GROUP: &str = "cloud";

const APP: ParameterSpec = ParameterSpec::value("app", "<app>", "Application name or slug")
    .required()
    .config("cloud.app");
const TENANT: ParameterSpec = ParameterSpec::value("tenant", "<tenant>", "Tenant name or slug")
    .required()
    .config("cloud.tenant");
const URL: ParameterSpec = ParameterSpec::value("url", "<url>", "NOUMENA Cloud portal")
    .config("cloud.url")
    .default("https://portal.noumena.cloud");
const AUTH_URL: ParameterSpec =
    ParameterSpec::value("auth-url", "<url>", "OpenID Connect base URL of the cloud realm")
        .config("cloud.authUrl")
        .default("https://keycloak.noumena.cloud/realms/paas/protocol/openid-connect");
const CLIENT_ID: ParameterSpec = ParameterSpec::value("client-id", "<id>", "OAuth client id")
    .config("cloud.clientId")
    .default("paas");
const SOURCE_DIR: ParameterSpec =
    ParameterSpec::value("source-dir", "<directory>", "Directory containing the NPL sources")
        .path()
        .config("cloud.sourceDir")
        .default(crate::config::DEFAULT_SOURCE_DIR);
const FRONTEND: ParameterSpec =
    ParameterSpec::value("frontend", "<directory>", "Built frontend to upload as website")
        .path()
        .config("cloud.frontend");

const LOGIN_PARAMETERS: &[ParameterSpec] = &[AUTH_URL, CLIENT_ID];
const DEPLOY_PARAMETERS: &[ParameterSpec] =
    &[APP, TENANT, URL, AUTH_URL, CLIENT_ID, SOURCE_DIR, FRONTEND];
const CLEAR_PARAMETERS: &[ParameterSpec] = &[APP, TENANT, URL, AUTH_URL, CLIENT_ID];

const SERVICE_ACCOUNT_ENV: &[EnvVarSpec] = &[EnvVarSpec {
    name: SERVICE_ACCOUNT_SECRET_VAR,
    description: "Service account secret; skips the interactive login",
}];

pub fn group_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: GROUP,
        description: "Manage NPL applications on NOUMENA Cloud",
        parameters: &[],
        env_variables: &[],
        hidden: false,
        factory: build_group,
    }
}

pub fn login_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "cloud login",
        description: "Log in to NOUMENA Cloud",
        parameters: LOGIN_PARAMETERS,
        env_variables: &[],
        hidden: false,
        factory: build_login,
    }
}

pub fn logout_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "cloud logout",
        description: "Forget the stored NOUMENA Cloud session",
        parameters: &[],
        env_variables: &[],
        hidden: false,
        factory: build_logout,
    }
}

pub fn deploy_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "cloud deploy",
        description: "Deploy NPL sources (and optionally a frontend) to NOUMENA Cloud",
        parameters: DEPLOY_PARAMETERS,
        env_variables: SERVICE_ACCOUNT_ENV,
        hidden: false,
        factory: build_deploy,
    }
}

pub fn clear_descriptor() -> CommandDescriptor {
    CommandDescriptor {
        command_name: "cloud clear",
        description: "Remove sources and data of a NOUMENA Cloud application",
        parameters: CLEAR_PARAMETERS,
        env_variables: SERVICE_ACCOUNT_ENV,
        hidden: false,
        factory: build_clear,
    }
}

fn build_group(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(PrintLines {
        lines: group_listing(input.registry, GROUP),
        output: input.context.output.clone(),
    }))
}

fn build_login(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(LoginCommand {
        auth: CloudAuthSettings::from_args(&input.args)?,
        context: input.context.clone(),
    }))
}

fn build_logout(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(LogoutCommand {
        context: input.context.clone(),
    }))
}

fn build_deploy(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(DeployCommand {
        settings: CloudSettings::from_args(&input.args)?,
        context: input.context.clone(),
    }))
}

fn build_clear(input: CommandInput<'_>) -> CliResult<Box<dyn Command>> {
    Ok(Box::new(ClearCommand {
        settings: CloudSettings::from_args(&input.args)?,
        context: input.context.clone(),
    }))
}

/// Auth manager for the cloud realm, honoring the context's service account secret.
fn auth_manager(auth: &CloudAuthSettings, context: &CliContext) -> AuthManager<OidcClient> {
    let client = OidcClient::new(
        context.http.clone(),
        OidcEndpoints::from_base(&auth.auth_url),
        auth.client_id.clone(),
    );
    AuthManager::new(client, context.output.clone())
        .with_browser(context.open_browser)
        .with_service_account_secret(context.service_account_secret.clone())
}

/// Access token for a cloud call.
///
/// A service account secret wins. Otherwise the stored refresh token is used,
/// and if the server rejects it (or nothing is stored) the device flow runs.
/// Tokens from the latter two are written back to the store.
pub async fn obtain_token<C: DeviceAuthorization>(
    manager: &AuthManager<C>,
    store: &TokenStore,
) -> Result<String> {
    if manager.uses_service_account() {
        let token = manager.authenticate().await?;
        return Ok(token.access_token);
    }

    match store.load() {
        Ok(Some(StoredToken {
            refresh_token: Some(refresh_token),
            ..
        })) => match manager.refresh(&refresh_token).await {
            Ok(token) => {
                debug!("Refreshed stored session");
                store.save(&StoredToken::from(&token))?;
                return Ok(token.access_token);
            }
            Err(e @ CliError::RestCall { .. }) => {
                warn!("Stored session could not be refreshed, logging in again: {}", e);
                store.clear()?;
            }
            // Transport failures keep the stored session for the next attempt
            Err(e) => return Err(e.into()),
        },
        Ok(_) => {}
        Err(e) => warn!("Ignoring unreadable token store: {:#}", e),
    }

    let token = manager.device_flow().await?;
    store.save(&StoredToken::from(&token))?;
    Ok(token.access_token)
}

/// Run the device flow, persist the tokens and report the expiry.
pub async fn login<C: DeviceAuthorization>(
    manager: &AuthManager<C>,
    store: &TokenStore,
    output: &Output,
) -> Result<()> {
    let token = manager.device_flow().await?;
    store.save(&StoredToken::from(&token))?;
    info!("Stored tokens in {}", store.path().display());

    output.line("✓ Login successful");
    match format_token_expiration(&token.access_token) {
        Ok(expiry) => output.line(format!("Token expires: {}", expiry)),
        Err(e) => debug!("Not showing token expiry: {:#}", e),
    }
    Ok(())
}

fn package(dir: &std::path::Path, what: &str) -> CliResult<Vec<u8>> {
    zip_directory(dir).map_err(|e| CliError::Command(format!("Failed to package {}: {:#}", what, e)))
}

/// Resolve the application and return a client for it together with the token.
async fn application_client(
    settings: &CloudSettings,
    context: &CliContext,
) -> Result<(DeploymentClient, String)> {
    let (tenant, app) = settings.target()?;
    let store = context.token_store()?;
    let token = obtain_token(&auth_manager(&settings.auth(), context), &store).await?;
    let application_id =
        resolve_application_id(&context.http, &settings.url, &token, tenant, app).await?;
    debug!(tenant, app, application_id = %application_id, "Resolved application");

    let client = DeploymentClient::new(
        context.http.clone(),
        DeploymentTarget::cloud_application(&settings.url, &application_id),
    );
    Ok((client, token))
}

pub async fn deploy(settings: &CloudSettings, context: &CliContext) -> Result<()> {
    let archive = package(&settings.source_dir, "sources")?;
    let frontend = settings
        .frontend
        .as_deref()
        .map(|dir| package(dir, "frontend"))
        .transpose()?;

    let (client, token) = application_client(settings, context).await?;
    let (tenant, app) = settings.target()?;

    client.upload(&token, &archive).await?;
    context
        .output
        .line(format!("✓ Deployed NPL sources to {}/{}", tenant, app));

    if let Some(frontend) = frontend {
        client.upload_website(&token, &frontend).await?;
        context
            .output
            .line(format!("✓ Deployed frontend to {}/{}", tenant, app));
    }
    Ok(())
}

pub async fn clear(settings: &CloudSettings, context: &CliContext) -> Result<()> {
    let (client, token) = application_client(settings, context).await?;
    let (tenant, app) = settings.target()?;
    client.clear(&token).await?;
    context
        .output
        .line(format!("✓ Cleared application {}/{}", tenant, app));
    Ok(())
}

struct LoginCommand {
    auth: CloudAuthSettings,
    context: CliContext,
}

#[async_trait]
impl Command for LoginCommand {
    async fn execute(&self) -> Result<()> {
        let client = OidcClient::new(
            self.context.http.clone(),
            OidcEndpoints::from_base(&self.auth.auth_url),
            self.auth.client_id.clone(),
        );
        let manager = AuthManager::new(client, self.context.output.clone())
            .with_browser(self.context.open_browser);
        let store = self.context.token_store()?;
        login(&manager, &store, &self.context.output).await
    }
}

struct LogoutCommand {
    context: CliContext,
}

#[async_trait]
impl Command for LogoutCommand {
    async fn execute(&self) -> Result<()> {
        let removed = self
            .context
            .token_store()?
            .clear()
            .context("Failed to log out")?;
        if removed {
            self.context.output.line("✓ Logged out");
        } else {
            self.context.output.line("Not logged in");
        }
        Ok(())
    }
}

struct DeployCommand {
    settings: CloudSettings,
    context: CliContext,
}

#[async_trait]
impl Command for DeployCommand {
    async fn execute(&self) -> Result<()> {
        deploy(&self.settings, &self.context).await
    }
}

struct ClearCommand {
    settings: CloudSettings,
    context: CliContext,
}

#[async_trait]
impl Command for ClearCommand {
    async fn execute(&self) -> Result<()> {
        clear(&self.settings, &self.context).await
    }
}
