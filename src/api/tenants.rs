use reqwest::Client;
use tracing::debug;
use url::Url;

use super::models::Tenant;
use crate::config::endpoint;
use crate::error::{CliError, CliResult};

/// List the tenants (with their applications) visible to the token.
pub async fn fetch_tenants(http: &Client, portal: &Url, token: &str) -> CliResult<Vec<Tenant>> {
    let operation = "Fetching tenants";
    let url = endpoint(portal, "api/v1/tenants");

    let response = http
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| CliError::http(operation, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(CliError::rest_call(operation, status, body));
    }

    let tenants: Vec<Tenant> = response
        .json()
        .await
        .map_err(|e| CliError::http("Parsing tenants response", e))?;
    debug!(count = tenants.len(), "Fetched tenants");

    Ok(tenants)
}

/// Id of application `app` in tenant `tenant`, matched by slug or name.
pub fn find_application_id(tenants: &[Tenant], tenant: &str, app: &str) -> CliResult<String> {
    let found = tenants
        .iter()
        .find(|t| t.is_named(tenant))
        .ok_or_else(|| CliError::Command(format!("Tenant '{}' not found", tenant)))?;

    found
        .application(app)
        .map(|a| a.id.clone())
        .ok_or_else(|| {
            CliError::Command(format!(
                "Application '{}' not found in tenant '{}'",
                app, tenant
            ))
        })
}

/// Resolve the application id for `tenant`/`app` on the portal.
pub async fn resolve_application_id(
    http: &Client,
    portal: &Url,
    token: &str,
    tenant: &str,
    app: &str,
) -> CliResult<String> {
    let tenants = fetch_tenants(http, portal, token).await?;
    find_application_id(&tenants, tenant, app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    fn tenants() -> Vec<Tenant> {
        serde_json::from_value(json!([
            {
                "id": "t-1",
                "name": "Acme Corp",
                "slug": "acme",
                "applications": [
                    { "id": "a-1", "name": "Banking", "slug": "bank" },
                    { "id": "a-2", "name": "Insurance" }
                ]
            },
            { "id": "t-2", "name": "Other" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_find_by_slug_or_name() {
        let tenants = tenants();
        assert_eq!(find_application_id(&tenants, "acme", "bank").unwrap(), "a-1");
        assert_eq!(find_application_id(&tenants, "ACME CORP", "insurance").unwrap(), "a-2");
    }

    #[test]
    fn test_missing_tenant_or_app() {
        let tenants = tenants();
        let err = find_application_id(&tenants, "nope", "bank").unwrap_err();
        assert_eq!(err.to_string(), "Tenant 'nope' not found");
        let err = find_application_id(&tenants, "other", "bank").unwrap_err();
        assert_eq!(err.to_string(), "Application 'bank' not found in tenant 'other'");
    }

    #[tokio::test]
    async fn test_fetch_tenants_requires_success() {
        let app = Router::new().route(
            "/api/v1/tenants",
            get(|headers: axum::http::HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer good") => (
                        StatusCode::OK,
                        Json(json!([{ "id": "t-1", "name": "acme", "applications": [] }])),
                    ),
                    _ => (StatusCode::FORBIDDEN, Json(json!({ "message": "no access" }))),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let portal = Url::parse(&format!("http://{}", addr)).unwrap();
        let http = Client::new();

        let tenants = fetch_tenants(&http, &portal, "good").await.unwrap();
        assert_eq!(tenants.len(), 1);

        match fetch_tenants(&http, &portal, "bad").await.unwrap_err() {
            CliError::RestCall { status, body, .. } => {
                assert_eq!(status.as_u16(), 403);
                assert!(body.contains("no access"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
