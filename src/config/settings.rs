//! Typed per-command-family settings built from [`ResolvedArgs`].

use std::path::PathBuf;
use tracing::debug;
use url::Url;

use super::ResolvedArgs;
use crate::error::{CliError, CliResult};

pub const DEFAULT_SOURCE_DIR: &str = ".";

/// Settings for commands that only look at the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureSettings {
    pub source_dir: PathBuf,
}

impl StructureSettings {
    pub fn from_args(args: &ResolvedArgs) -> Self {
        Self {
            source_dir: args
                .path("source-dir")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
        }
    }
}

/// Settings for deploying to a locally running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub management_url: Url,
    pub auth_url: Url,
    pub app: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub source_dir: PathBuf,
    pub clear: bool,
}

impl LocalSettings {
    pub fn from_args(args: &ResolvedArgs) -> CliResult<Self> {
        Ok(Self {
            management_url: parse_url(args, "management-url")?,
            auth_url: parse_url(args, "auth-url")?,
            app: args.required("app")?,
            username: args.required("username")?,
            password: args.required("password")?,
            client_id: args.required("client-id")?,
            client_secret: args.value("client-secret").map(str::to_string),
            source_dir: StructureSettings::from_args(args).source_dir,
            clear: args.flag("clear"),
        })
    }
}

/// Authorization server settings shared by all cloud commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAuthSettings {
    pub auth_url: Url,
    pub client_id: String,
}

impl CloudAuthSettings {
    pub fn from_args(args: &ResolvedArgs) -> CliResult<Self> {
        Ok(Self {
            auth_url: parse_url(args, "auth-url")?,
            client_id: args.required("client-id")?,
        })
    }
}

/// Settings for the cloud commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub app: Option<String>,
    pub tenant: Option<String>,
    pub url: Url,
    pub auth_url: Url,
    pub client_id: String,
    pub source_dir: PathBuf,
    pub frontend: Option<PathBuf>,
}

impl CloudSettings {
    pub fn from_args(args: &ResolvedArgs) -> CliResult<Self> {
        debug!(source = ?args.source("url"), "Portal URL");
        Ok(Self {
            app: args.value("app").map(str::to_string),
            tenant: args.value("tenant").map(str::to_string),
            url: parse_url(args, "url")?,
            auth_url: parse_url(args, "auth-url")?,
            client_id: args.required("client-id")?,
            source_dir: StructureSettings::from_args(args).source_dir,
            frontend: args.path("frontend"),
        })
    }

    pub fn auth(&self) -> CloudAuthSettings {
        CloudAuthSettings {
            auth_url: self.auth_url.clone(),
            client_id: self.client_id.clone(),
        }
    }

    /// Tenant and application, for commands that declared both as required.
    pub fn target(&self) -> CliResult<(&str, &str)> {
        match (self.tenant.as_deref(), self.app.as_deref()) {
            (Some(tenant), Some(app)) => Ok((tenant, app)),
            _ => Err(CliError::Command(
                "Both --tenant and --app are needed for this command".to_string(),
            )),
        }
    }
}

/// Parse a URL setting, dropping a trailing slash so paths can be appended.
fn parse_url(args: &ResolvedArgs, name: &str) -> CliResult<Url> {
    let raw = args.required(name)?;
    let trimmed = raw.trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| CliError::InvalidSetting {
        name: name.to_string(),
        reason: format!("'{}' is not a valid URL ({})", raw, e),
    })
}

/// Join a base URL and a path without losing the base's own path.
pub fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
