use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const MAX_FILE_SIZE_WEB: u64 = 5 * 1024 * 1024;
pub const MAX_FILE_SIZE_NATIVE: u64 = 10 * 1024 * 1024;

const DOCUMENTS_DIR_NAME: &str = "packndocs";
const STORE_FILE_NAME: &str = "packndocs-store.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Native,
    Web,
}

impl Default for Platform {
    fn default() -> Self {
        Self::Native
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    File,
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::File
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub storage: Option<StorageBackend>,
    #[serde(default)]
    pub max_file_size_web: Option<u64>,
    #[serde(default)]
    pub max_file_size_native: Option<u64>,
}

impl RuntimeConfig {
    /// Blank input means all defaults.
    pub fn from_json(config_json: &str) -> anyhow::Result<Self> {
        if config_json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(config_json).context("invalid runtime config JSON")
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_default()
    }

    pub fn storage(&self) -> StorageBackend {
        self.storage.unwrap_or_default()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(resolve_data_dir)
    }

    /// App-private directory holding copied attachments.
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir().join(DOCUMENTS_DIR_NAME)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join(STORE_FILE_NAME)
    }

    pub fn max_file_size(&self) -> u64 {
        match self.platform() {
            Platform::Web => self.max_file_size_web.unwrap_or(MAX_FILE_SIZE_WEB),
            Platform::Native => self.max_file_size_native.unwrap_or(MAX_FILE_SIZE_NATIVE),
        }
    }
}

fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join("packndocs");
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".packndocs")
}
