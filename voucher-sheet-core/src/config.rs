use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::contract::{GridGeometry, SkipPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub layout: GridGeometry,
    #[serde(default)]
    pub policy: SkipPolicy,
    #[serde(default)]
    pub export: Option<ExportSettings>,
}

/// Where server-side exports are fetched from. The credential is not part of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    pub base_url: String,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            items_per_row = self.layout.items_per_row,
            rows_per_page = self.layout.rows_per_page,
            max_skipped = ?self.policy.max_skipped,
            export_configured = self.export.is_some(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
