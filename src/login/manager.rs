//! Orchestration of the device authorization flow.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::device_flow::{DeviceAuthorization, TokenResponse};
use crate::error::{CliError, CliResult};
use crate::output::Output;

/// Environment variable holding a service account secret.
pub const SERVICE_ACCOUNT_SECRET_VAR: &str = "NPL_SERVICE_ACCOUNT_CLIENT_SECRET";

/// Added to the poll interval every time the server answers `slow_down`.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Drives the device flow (or the service account shortcut) against a
/// [`DeviceAuthorization`] client.
pub struct AuthManager<C> {
    client: C,
    output: Output,
    service_account_secret: Option<String>,
    open_browser: bool,
}

impl<C: DeviceAuthorization> AuthManager<C> {
    pub fn new(client: C, output: Output) -> Self {
        Self {
            client,
            output,
            service_account_secret: None,
            open_browser: false,
        }
    }

    /// Use a service account secret instead of the device flow. Blank secrets are ignored.
    pub fn with_service_account_secret(mut self, secret: Option<String>) -> Self {
        self.service_account_secret = secret.filter(|s| !s.trim().is_empty());
        self
    }

    /// Try to open the verification URL in a browser.
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn uses_service_account(&self) -> bool {
        self.service_account_secret.is_some()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Obtain a token: via the service account secret if one was given, else
    /// interactively through the device flow.
    pub async fn authenticate(&self) -> CliResult<TokenResponse> {
        if let Some(secret) = &self.service_account_secret {
            info!("Authenticating with service account secret");
            return self.client.client_credentials(secret).await;
        }
        self.device_flow().await
    }

    pub async fn refresh(&self, refresh_token: &str) -> CliResult<TokenResponse> {
        self.client.refresh_token(refresh_token).await
    }

    /// Run the full device flow: request a code, show it, then poll until the
    /// user approves, the server refuses, or the code expires.
    pub async fn device_flow(&self) -> CliResult<TokenResponse> {
        let device = self.client.request_device_code().await?;
        let verification_url = device.verification_url();

        self.output.line(format!(
            "Please open {} and enter the code {}",
            verification_url, device.user_code
        ));

        if self.open_browser {
            if let Err(e) = webbrowser::open(verification_url) {
                warn!("Failed to open browser automatically: {}", e);
            }
        }

        let mut interval = Duration::from_secs(device.interval.max(1));
        let expires_in = Duration::from_secs(device.expires_in);
        let started = Instant::now();

        loop {
            tokio::time::sleep(interval).await;

            if started.elapsed() > expires_in {
                self.output.line("");
                return Err(CliError::AuthorizationExpired {
                    seconds: device.expires_in,
                });
            }

            match self.client.poll_for_token(&device.device_code).await {
                Ok(token) => {
                    self.output.line("");
                    debug!(elapsed = ?started.elapsed(), "Device authorization completed");
                    return Ok(token);
                }
                Err(CliError::AuthorizationPending) => {
                    self.output.progress(".");
                }
                Err(CliError::SlowDown) => {
                    interval += SLOW_DOWN_INCREMENT;
                    debug!(interval = ?interval, "Server asked to slow down");
                }
                Err(e) => {
                    self.output.line("");
                    return Err(e);
                }
            }
        }
    }
}
