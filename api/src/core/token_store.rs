//! Per-user GitHub OAuth token storage.
//!
//! One JSON file per username under the store root. Tokens are stored as
//! plain files on the assumption that the host is single-tenant; the store
//! root can be pointed at a mounted secret volume via `TOKEN_STORE_DIR`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("token store serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// Filesystem-backed map from GitHub username to OAuth token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    root: PathBuf,
}

impl TokenStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Store root from `TOKEN_STORE_DIR`, defaulting next to the other
    /// project artifacts.
    pub fn from_env() -> Self {
        let root = std::env::var("TOKEN_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("code_data/tokens"));
        Self::new(root)
    }

    /// Usernames come from webhook payloads; anything outside the GitHub
    /// login alphabet is flattened so it cannot escape the store root.
    fn path_for(&self, username: &str) -> PathBuf {
        let safe: String = username
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{safe}.json"))
    }

    pub async fn store(&self, username: &str, token: &str) -> Result<(), TokenStoreError> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(username);
        let body = serde_json::to_vec_pretty(&StoredToken {
            token: token.to_string(),
        })?;
        fs::write(&path, body).await?;
        debug!("token store: saved token for {username}");
        Ok(())
    }

    /// Returns the stored token, or `None` when the user never authorized.
    pub async fn load(&self, username: &str) -> Result<Option<String>, TokenStoreError> {
        let path = self.path_for(username);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredToken = serde_json::from_slice(&raw)?;
        Ok(Some(stored.token))
    }
}
