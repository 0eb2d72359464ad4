//! HTTP clients for the cloud portal and the local engine management API.

pub mod deploy;
pub mod models;
pub mod multipart;
pub mod tenants;

pub use deploy::{DeploymentClient, DeploymentTarget};
