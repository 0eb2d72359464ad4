//! Cloud portal request/response types

use serde::{Deserialize, Serialize};

/// Application hosted under a tenant
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Tenant with its applications, as listed by `GET /api/v1/tenants`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// Case-insensitive match on slug or display name.
fn matches(candidate: &str, slug: Option<&str>, name: &str) -> bool {
    slug.is_some_and(|s| s.eq_ignore_ascii_case(candidate)) || name.eq_ignore_ascii_case(candidate)
}

impl Tenant {
    pub fn is_named(&self, candidate: &str) -> bool {
        matches(candidate, self.slug.as_deref(), &self.name)
    }

    pub fn application(&self, candidate: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|app| matches(candidate, app.slug.as_deref(), &app.name))
    }
}
