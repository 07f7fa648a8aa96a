//! Persistence for the bot wallet secret

use alloy::{
    primitives::{hex, Address, B256},
    signers::local::PrivateKeySigner,
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::info;

use crate::errors::{BotError, BotResult};

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// `None` when no wallet was saved yet.
    async fn load(&self) -> BotResult<Option<PrivateKeySigner>>;

    async fn save(&self, signer: &PrivateKeySigner) -> BotResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredWallet {
    address: Address,
    private_key: String,
    created_at: DateTime<Utc>,
}

/// Keeps the secret in a JSON file, readable only by the owner on unix.
pub struct JsonFileWalletStore {
    path: PathBuf,
}

impl JsonFileWalletStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn storage_error(&self, message: &str, source: anyhow::Error) -> BotError {
        BotError::Storage {
            message: format!("{} {}", message, self.path.display()),
            source,
        }
    }
}

#[async_trait]
impl WalletStore for JsonFileWalletStore {
    async fn load(&self) -> BotResult<Option<PrivateKeySigner>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error("cannot read", e.into())),
        };

        let stored: StoredWallet = serde_json::from_str(&raw)
            .map_err(|e| self.storage_error("malformed wallet file", e.into()))?;
        let signer = PrivateKeySigner::from_str(&stored.private_key)
            .map_err(|e| self.storage_error("invalid key in", anyhow!(e)))?;

        if signer.address() != stored.address {
            return Err(self.storage_error(
                "address mismatch in",
                anyhow!("stored {} but key derives {}", stored.address, signer.address()),
            ));
        }

        info!("🔑 Loaded bot wallet {}", stored.address);
        Ok(Some(signer))
    }

    async fn save(&self, signer: &PrivateKeySigner) -> BotResult<()> {
        let stored = StoredWallet {
            address: signer.address(),
            private_key: hex::encode_prefixed(signer.to_bytes()),
            created_at: Utc::now(),
        };

        let write = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(&stored)?;
            tokio::fs::write(&self.path, json).await?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
            }
            anyhow::Ok(())
        };
        write
            .await
            .context("writing wallet file")
            .map_err(|e| self.storage_error("cannot write", e))?;

        info!("💾 Saved bot wallet {} to {}", stored.address, self.path.display());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWalletStore {
    secret: Mutex<Option<B256>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn load(&self) -> BotResult<Option<PrivateKeySigner>> {
        let secret = *self.secret.lock().unwrap_or_else(|e| e.into_inner());
        secret
            .map(|bytes| {
                PrivateKeySigner::from_bytes(&bytes).map_err(|e| BotError::Storage {
                    message: "invalid key in memory store".to_string(),
                    source: anyhow!(e),
                })
            })
            .transpose()
    }

    async fn save(&self, signer: &PrivateKeySigner) -> BotResult<()> {
        *self.secret.lock().unwrap_or_else(|e| e.into_inner()) = Some(signer.to_bytes());
        Ok(())
    }
}
