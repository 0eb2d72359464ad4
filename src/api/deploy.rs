//! Archive upload and application clearing.
//!
//! Calls are synchronous from the caller's point of view and never retried.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, info};
use url::Url;

use super::multipart::MultipartBody;
use crate::config::endpoint;
use crate::error::{CliError, CliResult};

/// Where archives go and what the multipart part is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub deploy_url: String,
    pub clear_url: String,
    pub part_name: &'static str,
    pub website_url: Option<String>,
}

impl DeploymentTarget {
    /// Application hosted by the cloud portal.
    pub fn cloud_application(portal: &Url, application_id: &str) -> Self {
        let base = format!(
            "api/v1/applications/{}",
            urlencoding::encode(application_id)
        );
        Self {
            deploy_url: endpoint(portal, &format!("{}/deploy", base)),
            clear_url: endpoint(portal, &format!("{}/clear", base)),
            part_name: "npl_archive",
            website_url: Some(endpoint(portal, &format!("{}/uploadwebsite", base))),
        }
    }

    /// Management API of a locally running engine.
    pub fn local_engine(management_url: &Url) -> Self {
        let url = endpoint(management_url, "management/application");
        Self {
            deploy_url: url.clone(),
            clear_url: url,
            part_name: "archive",
            website_url: None,
        }
    }
}

pub struct DeploymentClient {
    http: Client,
    target: DeploymentTarget,
}

impl DeploymentClient {
    pub fn new(http: Client, target: DeploymentTarget) -> Self {
        Self { http, target }
    }

    /// Upload the NPL sources archive.
    pub async fn upload(&self, token: &str, archive: &[u8]) -> CliResult<()> {
        let multipart = MultipartBody::zip_archive(self.target.part_name, "npl.zip", archive);
        self.post_multipart(&self.target.deploy_url, token, multipart, "Upload archive")
            .await
    }

    /// Upload a frontend archive; only targets with a website endpoint support this.
    pub async fn upload_website(&self, token: &str, archive: &[u8]) -> CliResult<()> {
        let url = self.target.website_url.as_deref().ok_or_else(|| {
            CliError::Command("This target does not host frontends".to_string())
        })?;
        let multipart = MultipartBody::zip_archive("website_zip", "frontend.zip", archive);
        self.post_multipart(url, token, multipart, "Upload frontend").await
    }

    /// Remove all deployed sources and data of the application.
    pub async fn clear(&self, token: &str) -> CliResult<()> {
        let operation = "Clear application";
        debug!(url = %self.target.clear_url, "DELETE");
        let response = self
            .http
            .delete(&self.target.clear_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CliError::http(operation, e))?;

        ensure_success(response, operation).await?;
        info!("Cleared application at {}", self.target.clear_url);
        Ok(())
    }

    async fn post_multipart(
        &self,
        url: &str,
        token: &str,
        multipart: MultipartBody,
        operation: &str,
    ) -> CliResult<()> {
        debug!(url, boundary = multipart.boundary(), "POST multipart");
        let content_type = multipart.content_type();
        let body: Bytes = multipart.into_body();
        let size = body.len();

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| CliError::http(operation, e))?;

        ensure_success(response, operation).await?;
        info!(bytes = size, "{} to {} succeeded", operation, url);
        Ok(())
    }
}

async fn ensure_success(response: Response, operation: &str) -> CliResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(CliError::rest_call(operation, status, body))
}
