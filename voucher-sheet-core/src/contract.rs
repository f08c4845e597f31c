//! Shared data model and trait seams for sheet building and export retrieval.
//!
//! Everything the layout, assembly and export modules exchange lives here:
//! printable items, grid geometry, header text, rasters and the two result types.
//! The two collaborator seams ([`VisualRenderer`] and [`SheetCanvas`]) are annotated
//! for `mockall` so tests can drive the assembler without a real renderer or PDF.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RenderError;
use crate::layout::{CAPTION_HEIGHT, HEADER_HEIGHT};

/// Number of leading characters of a code shown under its visual.
pub const CAPTION_CHARS: usize = 8;

/// One redeemable code ready for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintableItem {
    id: String,
    visual_key: String,
    caption: String,
    value_label: String,
}

impl PrintableItem {
    pub fn new(
        id: impl Into<String>,
        visual_key: impl Into<String>,
        caption: impl Into<String>,
        value_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            visual_key: visual_key.into(),
            caption: caption.into(),
            value_label: value_label.into(),
        }
    }

    /// Builds an item whose id and visual key are the code itself, captioned with
    /// the code truncated to [`CAPTION_CHARS`].
    pub fn from_code(code: &str, value_label: impl Into<String>) -> Self {
        let caption: String = code.chars().take(CAPTION_CHARS).collect();
        Self::new(code, code, caption, value_label)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn visual_key(&self) -> &str {
        &self.visual_key
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn value_label(&self) -> &str {
        &self.value_label
    }
}

/// Formats an amount given in minor units (cents) as `12.50 EUR`.
pub fn format_value_label(minor_units: i64, currency: &str) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{sign}{}.{:02} {}", abs / 100, abs % 100, currency.trim())
}

/// Page and grid dimensions, all in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub item_size: f32,
    pub items_per_row: usize,
    pub rows_per_page: usize,
}

impl Default for GridGeometry {
    /// A4 portrait, 4 x 6 grid of 40 mm visuals.
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin: 14.0,
            item_size: 40.0,
            items_per_row: 4,
            rows_per_page: 6,
        }
    }
}

impl GridGeometry {
    /// Checks the grid density and dimensions, and that every row fits on the page below
    /// the header. Spacing that would come out negative is not an error: the layout
    /// clamps it to zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.items_per_row == 0 {
            return Err("items_per_row must be at least 1".into());
        }
        if self.rows_per_page == 0 {
            return Err("rows_per_page must be at least 1".into());
        }
        for (name, value) in [
            ("page_width", self.page_width),
            ("page_height", self.page_height),
            ("item_size", self.item_size),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be a positive number, got {value}"));
            }
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(format!("margin must be non-negative, got {}", self.margin));
        }
        let grid_bottom = self.grid_height();
        if grid_bottom > self.page_height {
            return Err(format!(
                "rows_per_page {} needs {grid_bottom} mm of page height, page_height is {}",
                self.rows_per_page, self.page_height
            ));
        }
        Ok(())
    }

    /// Distance from the top edge to the bottom of the last row's caption, in millimetres.
    pub fn grid_height(&self) -> f32 {
        HEADER_HEIGHT + self.rows_per_page as f32 * (self.item_size + CAPTION_HEIGHT)
    }
}

/// Resolved position of one item. Coordinates are millimetres from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub page_index: usize,
    pub local_index: usize,
    pub column: usize,
    pub row: usize,
    pub x: f32,
    pub y: f32,
}

impl PagePlacement {
    /// True for the first slot of a page, where the header has to be drawn.
    pub fn starts_page(&self) -> bool {
        self.local_index == 0
    }
}

/// Text block drawn at the top of every page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDescriptor {
    pub title_line: String,
    #[serde(default)]
    pub metadata_lines: Vec<String>,
}

impl HeaderDescriptor {
    pub fn new(title_line: impl Into<String>, metadata_lines: Vec<String>) -> Self {
        Self {
            title_line: title_line.into(),
            metadata_lines,
        }
    }

    /// Header for a batch of codes issued against a customer order.
    pub fn for_order(order_id: &str, customer: &str, item_count: usize) -> Self {
        Self::new(
            format!("Order {order_id}"),
            vec![
                format!("Customer: {customer}"),
                format!("Vouchers: {item_count}"),
            ],
        )
    }

    /// Header for a batch of codes generated for a promotional campaign.
    pub fn for_campaign(name: &str, valid_until: Option<&str>, item_count: usize) -> Self {
        let mut metadata_lines = vec![format!("Vouchers: {item_count}")];
        if let Some(until) = valid_until {
            metadata_lines.push(format!("Valid until: {until}"));
        }
        Self::new(format!("Campaign {name}"), metadata_lines)
    }
}

/// Kind of entity a batch belongs to; leads the suggested filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Order,
    Campaign,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "order",
            EntityKind::Campaign => "campaign",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity that owns a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOwner {
    pub kind: EntityKind,
    pub id: String,
}

impl BatchOwner {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// 8-bit grayscale bitmap of a visual token.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Raster {
    /// Returns `None` when a dimension is zero or the pixel buffer does not match it.
    pub fn grayscale(width: usize, height: usize, pixels: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Upper bound on tolerated render misses. `None` accepts any number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    #[serde(default)]
    pub max_skipped: Option<usize>,
}

impl SkipPolicy {
    pub fn allows(&self, skipped: usize) -> bool {
        self.max_skipped.map_or(true, |limit| skipped <= limit)
    }
}

/// Output of a sheet build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub binary: Vec<u8>,
    pub skipped_count: usize,
    pub suggested_filename: String,
}

impl BuildResult {
    /// One-line summary for the user.
    pub fn status_line(&self) -> String {
        match self.skipped_count {
            0 => "Downloaded.".to_string(),
            1 => "Downloaded. 1 item skipped.".to_string(),
            n => format!("Downloaded. {n} items skipped."),
        }
    }
}

/// Output of an export retrieval.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub binary: Vec<u8>,
    pub filename: String,
}

/// Produces the raster for a visual key. Implementations may do I/O or heavy work;
/// the render buffer awaits all of them before a build reads anything.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait VisualRenderer: Send + Sync {
    async fn render(&self, visual_key: &str) -> Result<Raster, RenderError>;
}

/// Drawing surface the page assembler writes to. Coordinates are millimetres from the
/// top-left corner of the current page; `y` of text is the baseline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SheetCanvas {
    /// Opens a new page; all following draws land on it.
    fn begin_page(&mut self, page_index: usize);

    /// Draws the title and metadata block at the top of the current page.
    fn draw_header(&mut self, header: &HeaderDescriptor);

    /// Stamps a raster with its top-left corner at `(x, y)`, scaled to `size` x `size`.
    fn draw_raster(&mut self, raster: &Raster, x: f32, y: f32, size: f32);

    fn draw_text(&mut self, text: &str, x: f32, y: f32, font_size_pt: f32);
}
