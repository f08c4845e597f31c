//! Batch files: the JSON document the `sheet` command prints from.
//!
//! ```json
//! {
//!   "owner": { "kind": "campaign", "id": "3f2a9c7e-..." },
//!   "title": "Spring promotion",
//!   "metadata": ["Valid until: 2026-12-31"],
//!   "items": [{ "code": "VCH-00001-7Q2K", "value_minor": 2500, "currency": "EUR" }]
//! }
//! ```
//!
//! When `title` is omitted the header is derived from the owner kind, using the optional
//! `customer` (orders) or `valid_until` (campaigns) fields.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use voucher_sheet_core::contract::{
    format_value_label, BatchOwner, EntityKind, HeaderDescriptor, PrintableItem,
};

#[derive(Debug, Deserialize)]
pub struct BatchFile {
    pub owner: BatchOwner,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Vec<String>,
    /// Used for order headers when no title is given.
    #[serde(default)]
    pub customer: Option<String>,
    /// Used for campaign headers when no title is given.
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub items: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEntry {
    pub code: String,
    pub value_minor: i64,
    pub currency: String,
}

impl BatchFile {
    pub fn printable_items(&self) -> Vec<PrintableItem> {
        self.items
            .iter()
            .map(|entry| {
                PrintableItem::from_code(
                    &entry.code,
                    format_value_label(entry.value_minor, &entry.currency),
                )
            })
            .collect()
    }

    pub fn header(&self) -> HeaderDescriptor {
        match &self.title {
            Some(title) => HeaderDescriptor::new(title.clone(), self.metadata.clone()),
            None => {
                let mut header = match self.owner.kind {
                    EntityKind::Order => HeaderDescriptor::for_order(
                        &self.owner.id,
                        self.customer.as_deref().unwrap_or("-"),
                        self.items.len(),
                    ),
                    EntityKind::Campaign => HeaderDescriptor::for_campaign(
                        &self.owner.id,
                        self.valid_until.as_deref(),
                        self.items.len(),
                    ),
                };
                header.metadata_lines.extend(self.metadata.iter().cloned());
                header
            }
        }
    }
}

pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<BatchFile> {
    let path_ref = path.as_ref();
    info!(batch_path = ?path_ref, "Loading batch file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, batch_path = ?path_ref, "Failed to read batch file");
        anyhow::anyhow!("Failed to read batch file {:?}: {}", path_ref, e)
    })?;

    let batch: BatchFile = serde_json::from_str(&content).map_err(|e| {
        error!(error = ?e, batch_path = ?path_ref, "Failed to parse batch JSON");
        anyhow::anyhow!("Failed to parse batch JSON: {e}")
    })?;

    info!(
        batch_path = ?path_ref,
        owner_kind = %batch.owner.kind,
        owner_id = %batch.owner.id,
        items = batch.items.len(),
        "Batch file loaded"
    );
    Ok(batch)
}
