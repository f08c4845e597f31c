//! Render buffer: rasters keyed by visual key, filled before a build starts.
//!
//! [`RenderBuffer::prepare`] starts one render per distinct key and awaits all of
//! them before returning, so the buffer handed to the assembler is complete. Keys
//! whose render failed are simply absent and surface as skips during assembly.

use async_trait::async_trait;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::contract::{PrintableItem, Raster, VisualRenderer};
use crate::error::RenderError;

#[derive(Debug, Default, Clone)]
pub struct RenderBuffer {
    rasters: HashMap<String, Raster>,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the visual of every item and waits until all renders have settled.
    pub async fn prepare<R>(items: &[PrintableItem], renderer: &R) -> Self
    where
        R: VisualRenderer + ?Sized,
    {
        let mut seen = HashSet::new();
        let keys: Vec<&str> = items
            .iter()
            .map(PrintableItem::visual_key)
            .filter(|key| seen.insert(*key))
            .collect();
        info!(items = items.len(), keys = keys.len(), "Rendering visuals");

        let outcomes = join_all(keys.iter().map(|key| async move {
            (*key, renderer.render(key).await)
        }))
        .await;

        let mut buffer = Self::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(raster) => buffer.insert(key, raster),
                Err(e) => warn!(visual_key = key, error = %e, "Visual render failed"),
            }
        }
        info!(ready = buffer.len(), "Render barrier passed");
        buffer
    }

    pub fn insert(&mut self, visual_key: impl Into<String>, raster: Raster) {
        self.rasters.insert(visual_key.into(), raster);
    }

    /// `None` means the visual is not ready; the caller decides how to degrade.
    pub fn get(&self, visual_key: &str) -> Option<&Raster> {
        self.rasters.get(visual_key)
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Raster)> for RenderBuffer {
    fn from_iter<I: IntoIterator<Item = (K, Raster)>>(iter: I) -> Self {
        let mut buffer = Self::new();
        for (key, raster) in iter {
            buffer.insert(key, raster);
        }
        buffer
    }
}

/// Cells per side of a digest glyph, including the quiet border.
const GLYPH_CELLS: usize = 11;
const GLYPH_BORDER: usize = 1;

/// Deterministic visual token: a horizontally mirrored cell pattern taken from the
/// SHA-256 digest of the key, framed by a quiet border. Not a scannable symbology.
#[derive(Debug, Clone)]
pub struct DigestGlyphRenderer {
    pixels_per_cell: usize,
}

impl DigestGlyphRenderer {
    pub fn new(pixels_per_cell: usize) -> Self {
        Self {
            pixels_per_cell: pixels_per_cell.max(1),
        }
    }

    pub fn render_sync(&self, visual_key: &str) -> Result<Raster, RenderError> {
        if visual_key.is_empty() {
            return Err(RenderError::Failed {
                key: visual_key.to_string(),
                reason: "empty visual key".into(),
            });
        }

        let digest = Sha256::digest(visual_key.as_bytes());
        let bit = |n: usize| (digest[(n / 8) % digest.len()] >> (n % 8)) & 1 == 1;

        let inner = GLYPH_CELLS - 2 * GLYPH_BORDER;
        let half = inner.div_ceil(2);
        let mut cells = vec![false; GLYPH_CELLS * GLYPH_CELLS];
        for row in 0..inner {
            for col in 0..half {
                let on = bit(row * half + col);
                let r = row + GLYPH_BORDER;
                cells[r * GLYPH_CELLS + col + GLYPH_BORDER] = on;
                cells[r * GLYPH_CELLS + (inner - 1 - col) + GLYPH_BORDER] = on;
            }
        }

        let ppc = self.pixels_per_cell;
        let side = GLYPH_CELLS * ppc;
        let mut pixels = vec![255u8; side * side];
        for (i, on) in cells.iter().enumerate() {
            if !on {
                continue;
            }
            let (cell_row, cell_col) = (i / GLYPH_CELLS, i % GLYPH_CELLS);
            for py in cell_row * ppc..(cell_row + 1) * ppc {
                pixels[py * side + cell_col * ppc..py * side + (cell_col + 1) * ppc].fill(0);
            }
        }
        debug!(visual_key, side, "Rendered digest glyph");

        Raster::grayscale(side, side, pixels).ok_or_else(|| RenderError::Failed {
            key: visual_key.to_string(),
            reason: "glyph buffer size mismatch".into(),
        })
    }
}

impl Default for DigestGlyphRenderer {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl VisualRenderer for DigestGlyphRenderer {
    async fn render(&self, visual_key: &str) -> Result<Raster, RenderError> {
        self.render_sync(visual_key)
    }
}
