//! Sheet assembly: places printable items on a canvas and produces the final PDF.
//!
//! [`PageAssembler`] walks the items in input order against the placements from
//! [`crate::layout`], drawing the header at the top of each page and the visual plus
//! caption for each item. Items whose visual is missing from the [`RenderBuffer`] are
//! counted and skipped; they never abort the batch.
//!
//! [`ArtifactBuilder`] wraps the assembler with input validation, the skip policy,
//! the printpdf canvas and filename generation. Order and campaign batches go through
//! the same builder; only the [`BatchOwner`] and [`HeaderDescriptor`] differ.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::contract::{
    BatchOwner, BuildResult, GridGeometry, HeaderDescriptor, PrintableItem, SheetCanvas,
    SkipPolicy, VisualRenderer,
};
use crate::error::BuildError;
use crate::layout::{self, CAPTION_HEIGHT};
use crate::pdf::PdfCanvas;
use crate::render::RenderBuffer;

const CAPTION_FONT_PT: f32 = 6.0;
/// Baselines of the caption and value label, measured down from the visual's bottom edge.
const CAPTION_OFFSET: f32 = 2.0;
const VALUE_LABEL_OFFSET: f32 = CAPTION_HEIGHT - 0.5;

pub struct PageAssembler<'a> {
    geometry: &'a GridGeometry,
    header: &'a HeaderDescriptor,
    buffer: &'a RenderBuffer,
}

impl<'a> PageAssembler<'a> {
    pub fn new(
        geometry: &'a GridGeometry,
        header: &'a HeaderDescriptor,
        buffer: &'a RenderBuffer,
    ) -> Self {
        Self {
            geometry,
            header,
            buffer,
        }
    }

    /// Draws every item onto `canvas` and returns the number of skipped items.
    pub fn assemble<C>(&self, items: &[PrintableItem], canvas: &mut C) -> usize
    where
        C: SheetCanvas + ?Sized,
    {
        let placements = layout::compute_placements(items.len(), self.geometry);
        let size = self.geometry.item_size;
        let mut skipped = 0;

        for (item, placement) in items.iter().zip(&placements) {
            if placement.starts_page() {
                canvas.begin_page(placement.page_index);
                canvas.draw_header(self.header);
            }

            let Some(raster) = self.buffer.get(item.visual_key()) else {
                debug!(
                    item_id = item.id(),
                    visual_key = item.visual_key(),
                    page = placement.page_index,
                    "Visual not ready, skipping item"
                );
                skipped += 1;
                continue;
            };

            canvas.draw_raster(raster, placement.x, placement.y, size);
            let bottom = placement.y + size;
            canvas.draw_text(
                item.caption(),
                placement.x,
                bottom + CAPTION_OFFSET,
                CAPTION_FONT_PT,
            );
            canvas.draw_text(
                item.value_label(),
                placement.x,
                bottom + VALUE_LABEL_OFFSET,
                CAPTION_FONT_PT,
            );
        }

        skipped
    }
}

/// Builds the printable PDF for one batch.
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    geometry: GridGeometry,
    owner: BatchOwner,
    policy: SkipPolicy,
}

impl ArtifactBuilder {
    pub fn new(geometry: GridGeometry, owner: BatchOwner) -> Self {
        Self {
            geometry,
            owner,
            policy: SkipPolicy::default(),
        }
    }

    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Lays out `items` using rasters already present in `buffer`.
    pub fn build(
        &self,
        items: &[PrintableItem],
        header: &HeaderDescriptor,
        buffer: &RenderBuffer,
        generated_at: DateTime<Utc>,
    ) -> Result<BuildResult, BuildError> {
        if items.is_empty() {
            error!(owner = %self.owner.kind, "Refusing to build an empty batch");
            return Err(BuildError::EmptyBatch);
        }
        self.geometry.validate().map_err(|reason| {
            error!(reason = %reason, "Grid geometry rejected");
            BuildError::InvalidGeometry(reason)
        })?;

        info!(
            owner_kind = %self.owner.kind,
            owner_id = %self.owner.id,
            items = items.len(),
            pages = layout::page_count(items.len(), &self.geometry),
            "Assembling sheet"
        );

        let mut canvas = PdfCanvas::new(
            &header.title_line,
            self.geometry.page_width,
            self.geometry.page_height,
            self.geometry.margin,
        );
        let skipped_count =
            PageAssembler::new(&self.geometry, header, buffer).assemble(items, &mut canvas);

        if !self.policy.allows(skipped_count) {
            let limit = self.policy.max_skipped.unwrap_or_default();
            error!(skipped = skipped_count, limit, "Too many items without a visual");
            return Err(BuildError::TooManySkipped {
                skipped: skipped_count,
                limit,
            });
        }
        if skipped_count > 0 {
            warn!(skipped = skipped_count, "Some items were left off the sheet");
        }

        let binary = canvas.finish();
        let suggested_filename = suggested_filename(&self.owner, generated_at);
        info!(
            filename = %suggested_filename,
            size = binary.len(),
            skipped = skipped_count,
            "Sheet built"
        );

        Ok(BuildResult {
            binary,
            skipped_count,
            suggested_filename,
        })
    }

    /// Renders every visual through `renderer`, waits for all of them, then builds.
    pub async fn render_and_build<R>(
        &self,
        items: &[PrintableItem],
        header: &HeaderDescriptor,
        renderer: &R,
        generated_at: DateTime<Utc>,
    ) -> Result<BuildResult, BuildError>
    where
        R: VisualRenderer + ?Sized,
    {
        if items.is_empty() {
            error!(owner = %self.owner.kind, "Refusing to build an empty batch");
            return Err(BuildError::EmptyBatch);
        }
        let buffer = RenderBuffer::prepare(items, renderer).await;
        self.build(items, header, &buffer, generated_at)
    }
}

/// `{kind}-{first 8 chars of id}-{YYYY-MM-DD-HH-MM}.pdf`, safe on every filesystem.
pub fn suggested_filename(owner: &BatchOwner, generated_at: DateTime<Utc>) -> String {
    let short_id: String = owner.id.chars().take(8).collect();
    let stamp = generated_at
        .format("%Y-%m-%dT%H:%M")
        .to_string()
        .replace([':', 'T'], "-");
    format!("{}-{}-{}.pdf", owner.kind, short_id, stamp)
}
