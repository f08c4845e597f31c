//! Grid placement of printable items across pages.
//!
//! Pure arithmetic, no I/O. Items fill a page left to right, top to bottom; the next
//! page starts once `items_per_row * rows_per_page` slots are used. Vertical space is
//! reserved for the page header ([`HEADER_HEIGHT`]) and for the two caption lines
//! under every visual ([`CAPTION_HEIGHT`]).

use crate::contract::{GridGeometry, PagePlacement};

/// Space above the first row, in millimetres.
pub const HEADER_HEIGHT: f32 = 24.0;

/// Space below each visual for its caption and value label, in millimetres.
pub const CAPTION_HEIGHT: f32 = 5.0;

/// Gap between adjacent columns. Clamped to zero when the row does not fit the page.
pub fn column_spacing(geometry: &GridGeometry) -> f32 {
    let per_row = geometry.items_per_row.max(1);
    let free = geometry.page_width - 2.0 * geometry.margin - geometry.item_size * per_row as f32;
    let gaps = per_row.saturating_sub(1).max(1) as f32;
    (free / gaps).max(0.0)
}

pub fn items_per_page(geometry: &GridGeometry) -> usize {
    geometry.items_per_row.max(1) * geometry.rows_per_page.max(1)
}

/// Pages needed for `item_count` items; zero for an empty batch.
pub fn page_count(item_count: usize, geometry: &GridGeometry) -> usize {
    item_count.div_ceil(items_per_page(geometry))
}

/// Computes one placement per item index, in input order.
pub fn compute_placements(item_count: usize, geometry: &GridGeometry) -> Vec<PagePlacement> {
    let spacing = column_spacing(geometry);
    let per_row = geometry.items_per_row.max(1);
    let per_page = items_per_page(geometry);

    (0..item_count)
        .map(|i| {
            let local_index = i % per_page;
            let column = local_index % per_row;
            let row = local_index / per_row;
            PagePlacement {
                page_index: i / per_page,
                local_index,
                column,
                row,
                x: geometry.margin + column as f32 * (geometry.item_size + spacing),
                y: HEADER_HEIGHT + row as f32 * (geometry.item_size + CAPTION_HEIGHT),
            }
        })
        .collect()
}
