pub mod args;
pub mod check;
pub mod cloud;
pub mod dispatch;
pub mod help;
pub mod local;
pub mod registry;
pub mod suggest;
pub mod version;

use reqwest::Client;

use crate::config::TokenStore;
use crate::output::Output;
pub use dispatch::{Dispatcher, ExitStatus};
pub use registry::Registry;

/// Per-invocation resources shared by all commands.
#[derive(Clone)]
pub struct CliContext {
    pub output: Output,
    pub http: Client,
    /// Overrides `~/.npl/cloud/token.json`.
    pub token_store: Option<TokenStore>,
    pub service_account_secret: Option<String>,
    /// Open the device verification URL in a browser.
    pub open_browser: bool,
}

impl CliContext {
    /// Token store for cloud commands. The home directory is only looked up
    /// here, so commands that never touch the cloud work without one.
    pub fn token_store(&self) -> anyhow::Result<TokenStore> {
        match &self.token_store {
            Some(store) => Ok(store.clone()),
            None => TokenStore::default_location(),
        }
    }
}

/// All commands, in the order `help` lists them.
pub fn commands() -> Registry {
    Registry::new(vec![
        version::descriptor(),
        help::descriptor(),
        check::descriptor(),
        local::deploy_descriptor(),
        cloud::group_descriptor(),
        cloud::login_descriptor(),
        cloud::logout_descriptor(),
        cloud::deploy_descriptor(),
        cloud::clear_descriptor(),
    ])
}
