use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::endpoint;
use crate::error::{CliError, CliResult};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_SCOPE: &str = "openid offline_access";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_interval() -> u64 {
    5 // 5 seconds
}

fn default_expires_in() -> u64 {
    600 // 10 minutes
}

impl DeviceCodeResponse {
    /// URL the user should open, preferring the one with the code embedded.
    pub fn verification_url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The OAuth2 calls the login flows are built from.
///
/// Every call is independent and never retried here; retry policy belongs to
/// [`super::AuthManager`].
#[async_trait]
pub trait DeviceAuthorization: Send + Sync {
    async fn request_device_code(&self) -> CliResult<DeviceCodeResponse>;

    /// One poll of the token endpoint. Fails with [`CliError::AuthorizationPending`]
    /// or [`CliError::SlowDown`] while the user has not finished.
    async fn poll_for_token(&self, device_code: &str) -> CliResult<TokenResponse>;

    async fn refresh_token(&self, refresh_token: &str) -> CliResult<TokenResponse>;

    /// Exchange a service account secret for a token without user interaction.
    async fn client_credentials(&self, client_secret: &str) -> CliResult<TokenResponse>;
}

/// Device and token endpoints of an OpenID Connect provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcEndpoints {
    pub device: String,
    pub token: String,
}

impl OidcEndpoints {
    /// Keycloak layout below a realm's `protocol/openid-connect` base URL.
    pub fn from_base(base: &Url) -> Self {
        Self {
            device: endpoint(base, "auth/device"),
            token: endpoint(base, "token"),
        }
    }

    /// Endpoints of `realm` on a Keycloak server rooted at `server`.
    pub fn for_realm(server: &Url, realm: &str) -> Self {
        let base = format!(
            "realms/{}/protocol/openid-connect",
            urlencoding::encode(realm)
        );
        Self {
            device: endpoint(server, &format!("{}/auth/device", base)),
            token: endpoint(server, &format!("{}/token", base)),
        }
    }
}

/// Talks to the authorization server over HTTP.
pub struct OidcClient {
    http: Client,
    endpoints: OidcEndpoints,
    client_id: String,
    client_secret: Option<String>,
    scope: String,
}

impl OidcClient {
    pub fn new(http: Client, endpoints: OidcEndpoints, client_id: impl Into<String>) -> Self {
        Self {
            http,
            endpoints,
            client_id: client_id.into(),
            client_secret: None,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Resource owner password grant, used against local engines.
    pub async fn password_grant(&self, username: &str, password: &str) -> CliResult<TokenResponse> {
        let mut params = self.base_params("password");
        params.push(("username", username.to_string()));
        params.push(("password", password.to_string()));

        let response = self.post_form(&self.endpoints.token, &params, "Token request").await?;
        expect_token(response, "Token request").await
    }

    fn base_params(&self, grant_type: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("client_id", self.client_id.clone()),
            ("grant_type", grant_type.to_string()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.clone()));
        }
        params
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        operation: &str,
    ) -> CliResult<Response> {
        debug!(url, operation, "POST");
        self.http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| CliError::http(operation, e))
    }
}

#[async_trait]
impl DeviceAuthorization for OidcClient {
    async fn request_device_code(&self) -> CliResult<DeviceCodeResponse> {
        let operation = "Device authorization request";
        let params = vec![
            ("client_id", self.client_id.clone()),
            ("scope", self.scope.clone()),
        ];

        let response = self.post_form(&self.endpoints.device, &params, operation).await?;

        if response.status() != StatusCode::OK {
            return Err(rest_failure(response, operation).await);
        }

        response
            .json()
            .await
            .map_err(|e| CliError::http("Parsing device authorization response", e))
    }

    async fn poll_for_token(&self, device_code: &str) -> CliResult<TokenResponse> {
        let mut params = self.base_params(DEVICE_CODE_GRANT);
        params.push(("device_code", device_code.to_string()));
        params.push(("scope", self.scope.clone()));

        let response = self.post_form(&self.endpoints.token, &params, "Token poll").await?;
        let status = response.status();

        if status == StatusCode::OK {
            return response
                .json()
                .await
                .map_err(|e| CliError::http("Parsing token response", e));
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TokenErrorResponse> = serde_json::from_str(&body).ok();

        match (status, parsed) {
            (StatusCode::BAD_REQUEST, Some(err)) if err.error == "authorization_pending" => {
                Err(CliError::AuthorizationPending)
            }
            (StatusCode::BAD_REQUEST, Some(err)) if err.error == "slow_down" => {
                Err(CliError::SlowDown)
            }
            (_, Some(err)) => Err(CliError::AuthorizationFailed {
                error: err.error,
                description: err.error_description,
            }),
            (status, None) => Err(CliError::AuthorizationFailed {
                error: format!("status {}", status),
                description: Some(body).filter(|b| !b.is_empty()),
            }),
        }
    }

    async fn refresh_token(&self, refresh_token: &str) -> CliResult<TokenResponse> {
        let mut params = self.base_params("refresh_token");
        params.push(("refresh_token", refresh_token.to_string()));

        let response = self.post_form(&self.endpoints.token, &params, "Token refresh").await?;
        expect_token(response, "Token refresh").await
    }

    async fn client_credentials(&self, client_secret: &str) -> CliResult<TokenResponse> {
        let params = vec![
            ("client_id", self.client_id.clone()),
            ("grant_type", "client_credentials".to_string()),
            ("client_secret", client_secret.to_string()),
            ("scope", self.scope.clone()),
        ];

        let response = self
            .post_form(&self.endpoints.token, &params, "Service account token request")
            .await?;
        expect_token(response, "Service account token request").await
    }
}

async fn expect_token(response: Response, operation: &str) -> CliResult<TokenResponse> {
    if response.status() != StatusCode::OK {
        return Err(rest_failure(response, operation).await);
    }
    response
        .json()
        .await
        .map_err(|e| CliError::http(format!("Parsing {} response", operation), e))
}

async fn rest_failure(response: Response, operation: &str) -> CliError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    CliError::rest_call(operation, status, body)
}
