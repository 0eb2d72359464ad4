//! Project-level configuration file (`npl.yml` / `npl.yaml`).

use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["npl.yml", "npl.yaml"];

/// Parsed `npl.yml`, addressed by dot-separated paths such as `cloud.app`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    document: Value,
}

impl ConfigFile {
    /// A config file with no values, used when no file is present.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let document: Value = serde_yaml::from_str(content)?;
        Ok(Self {
            path: None,
            document,
        })
    }

    /// Load the config file from `dir`.
    ///
    /// A missing or unparsable file yields an empty config; only a warning is
    /// logged for the latter.
    pub fn load_from_dir(dir: &Path) -> Self {
        let candidates: Vec<PathBuf> = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        if candidates.len() > 1 {
            warn!("Both npl.yml and npl.yaml found. Using npl.yml.");
        }

        let Some(path) = candidates.into_iter().next() else {
            debug!("No npl.yml found in {}", dir.display());
            return Self::empty();
        };

        info!("Loading configuration from {}", path.display());
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return Self::empty();
            }
        };

        match Self::from_yaml(&content) {
            Ok(config) => Self {
                path: Some(path),
                ..config
            },
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Scalar at `path`, rendered as a string. Mappings and sequences are not values.
    pub fn lookup(&self, path: &str) -> Option<String> {
        let mut node = &self.document;
        for segment in path.split('.') {
            node = node.as_mapping()?.get(segment)?;
        }
        match node {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Dot-separated paths of every scalar leaf in the document.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_leaves(&self.document, String::new(), &mut paths);
        paths
    }
}

fn collect_leaves(node: &Value, prefix: String, out: &mut Vec<String>) {
    match node {
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else { continue };
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaves(value, path, out);
            }
        }
        Value::Null => {}
        _ if !prefix.is_empty() => out.push(prefix),
        _ => {}
    }
}
