use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::login::TokenResponse;

/// Tokens persisted by `npl cloud login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl From<&TokenResponse> for StoredToken {
    fn from(token: &TokenResponse) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
        }
    }
}

/// JSON file holding the cloud tokens, `~/.npl/cloud/token.json` by default.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the user's home directory
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(Self::new(home.join(".npl").join("cloud").join("token.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token, `None` if nobody logged in yet.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).context("Failed to read token file")?;
        let token: StoredToken =
            serde_json::from_str(&contents).context("Failed to parse token file")?;

        Ok(Some(token))
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create token directory")?;
        }

        let json = serde_json::to_string_pretty(token).context("Failed to serialize token")?;
        fs::write(&self.path, json).context("Failed to write token file")?;
        debug!("Saved token to {}", self.path.display());

        Ok(())
    }

    /// Remove the stored token. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).context("Failed to remove token file")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(temp_dir.path().join("nested").join("token.json"));

        assert_eq!(store.load().unwrap(), None);
        assert!(!store.clear().unwrap());

        let token = StoredToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), Some(token));

        assert!(store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(TokenStore::new(path).load().is_err());
    }
}
