use std::path::PathBuf;

use serde::Deserialize;

/// Blob storage configuration shared by every process that touches the store.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root of the content-addressed blob tree. Default: "./data/blobs".
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,
    /// Largest accepted upload in bytes. Default: 128 MiB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
    /// Reject uploads whose client-declared size differs from the bytes received.
    /// Default: false (the declared size is recorded as given).
    #[serde(default)]
    pub verify_declared_size: bool,
    /// Scratch directory for in-flight uploads. Defaults to `{blob_dir}/.incoming`.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_max_blob_size() -> u64 {
    128 * 1024 * 1024
}

impl StorageConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.blob_dir.join(".incoming"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: default_blob_dir(),
            max_blob_size: default_max_blob_size(),
            verify_declared_size: false,
            scratch_dir: None,
        }
    }
}
