//! Media store configuration types.

use super::defaults::{default_max_upload_size, default_uploads_dir};
use serde::{Deserialize, Serialize};

/// Configuration for uploaded media storage and streaming.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MediaConfig {
    /// Filesystem directory for uploaded media, created on startup if absent
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Maximum accepted upload size in bytes; larger uploads get 413
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}
