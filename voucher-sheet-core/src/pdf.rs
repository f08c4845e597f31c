//! printpdf-backed [`SheetCanvas`].
//!
//! Ops are collected per page and turned into a document on [`PdfCanvas::finish`].
//! The assembler works in millimetres from the top-left corner; PDF user space grows
//! upwards from the bottom-left, so every draw flips `y` against the page height.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, warn};

use crate::contract::{HeaderDescriptor, Raster, SheetCanvas};
use crate::layout::HEADER_HEIGHT;

const TITLE_FONT_PT: f32 = 12.0;
const METADATA_FONT_PT: f32 = 8.0;
/// Baseline of the title, millimetres from the top edge.
const TITLE_BASELINE: f32 = 10.0;
const METADATA_LINE_GAP: f32 = 4.0;
/// Metadata lines whose baseline stays at least 1 mm above the first row.
const METADATA_LINE_LIMIT: usize =
    ((HEADER_HEIGHT - TITLE_BASELINE - 1.0) / METADATA_LINE_GAP) as usize;
const TEXT_FONT: BuiltinFont = BuiltinFont::Helvetica;
const TITLE_FONT: BuiltinFont = BuiltinFont::HelveticaBold;

pub struct PdfCanvas {
    doc: PdfDocument,
    page_width: f32,
    page_height: f32,
    margin: f32,
    pages: Vec<Vec<Op>>,
}

impl PdfCanvas {
    pub fn new(title: &str, page_width: f32, page_height: f32, margin: f32) -> Self {
        Self {
            doc: PdfDocument::new(title),
            page_width,
            page_height,
            margin,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialises all pages into PDF bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let pages: Vec<PdfPage> = self
            .pages
            .drain(..)
            .map(|ops| PdfPage::new(Mm(self.page_width), Mm(self.page_height), ops))
            .collect();
        let page_count = pages.len();

        let mut warnings = Vec::new();
        let bytes = self
            .doc
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings while saving");
        }
        debug!(pages = page_count, size = bytes.len(), "PDF document serialised");
        bytes
    }

    /// Point `(x, y)` given in top-left millimetres, converted to PDF space.
    fn point(&self, x: f32, y: f32) -> Point {
        Point {
            x: Mm(x).into(),
            y: Mm(self.page_height - y).into(),
        }
    }

    fn current_ops(&mut self) -> &mut Vec<Op> {
        if self.pages.is_empty() {
            warn!("Draw before begin_page; opening an implicit page");
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn push_text(&mut self, text: &str, x: f32, y: f32, size_pt: f32, font: BuiltinFont) {
        let pos = self.point(x, y);
        self.current_ops().extend([
            Op::StartTextSection,
            Op::SetTextCursor { pos },
            Op::SetFontSizeBuiltinFont {
                size: Pt(size_pt),
                font: font.clone(),
            },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(text.to_string())],
                font,
            },
            Op::EndTextSection,
        ]);
    }
}

impl SheetCanvas for PdfCanvas {
    fn begin_page(&mut self, page_index: usize) {
        debug!(page_index, "Starting PDF page");
        self.pages.push(Vec::new());
    }

    fn draw_header(&mut self, header: &HeaderDescriptor) {
        let x = self.margin;
        self.push_text(&header.title_line, x, TITLE_BASELINE, TITLE_FONT_PT, TITLE_FONT);
        let dropped = header.metadata_lines.len().saturating_sub(METADATA_LINE_LIMIT);
        if dropped > 0 {
            warn!(
                dropped,
                limit = METADATA_LINE_LIMIT,
                "Header metadata does not fit above the grid; extra lines left out"
            );
        }
        for (i, line) in header
            .metadata_lines
            .iter()
            .take(METADATA_LINE_LIMIT)
            .enumerate()
        {
            let y = TITLE_BASELINE + METADATA_LINE_GAP * (i + 1) as f32;
            self.push_text(line, x, y, METADATA_FONT_PT, TEXT_FONT);
        }
    }

    fn draw_raster(&mut self, raster: &Raster, x: f32, y: f32, size: f32) {
        let image = RawImage {
            pixels: RawImageData::U8(raster.pixels().to_vec()),
            width: raster.width(),
            height: raster.height(),
            data_format: RawImageFormat::R8,
            tag: Vec::new(),
        };
        let id = self.doc.add_image(&image);

        // At 72 dpi one raster pixel is one point, so the scale maps pixels to `size`.
        let size_pt = Pt::from(Mm(size)).0;
        let origin = self.point(x, y + size);
        let transform = XObjectTransform {
            translate_x: Some(origin.x),
            translate_y: Some(origin.y),
            scale_x: Some(size_pt / raster.width() as f32),
            scale_y: Some(size_pt / raster.height() as f32),
            dpi: Some(72.0),
            ..XObjectTransform::default()
        };
        self.current_ops().push(Op::UseXobject { id, transform });
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, font_size_pt: f32) {
        self.push_text(text, x, y, font_size_pt, TEXT_FONT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_canvas_is_a_pdf() {
        let mut canvas = PdfCanvas::new("test", 210.0, 297.0, 14.0);
        canvas.begin_page(0);
        canvas.draw_header(&HeaderDescriptor::new("Title", vec!["meta".into()]));
        let raster = Raster::grayscale(2, 2, vec![0, 255, 255, 0]).unwrap();
        canvas.draw_raster(&raster, 14.0, 24.0, 40.0);
        canvas.draw_text("ABCDEFGH", 14.0, 66.0, 6.0);
        canvas.begin_page(1);
        assert_eq!(canvas.page_count(), 2);

        let bytes = canvas.finish();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    fn text_sections(canvas: &PdfCanvas) -> usize {
        canvas.pages[0]
            .iter()
            .filter(|op| matches!(op, Op::StartTextSection))
            .count()
    }

    #[test]
    fn header_lines_stay_above_the_grid() {
        assert_eq!(METADATA_LINE_LIMIT, 3);
        let last_baseline = TITLE_BASELINE + METADATA_LINE_GAP * METADATA_LINE_LIMIT as f32;
        assert!(last_baseline < HEADER_HEIGHT);
        assert!(last_baseline + METADATA_LINE_GAP >= HEADER_HEIGHT);

        let mut canvas = PdfCanvas::new("test", 210.0, 297.0, 14.0);
        canvas.begin_page(0);
        let metadata = (1..=5).map(|i| format!("line {i}")).collect();
        canvas.draw_header(&HeaderDescriptor::new("Campaign", metadata));
        // title plus the lines that fit
        assert_eq!(text_sections(&canvas), 1 + METADATA_LINE_LIMIT);
    }

    #[test]
    fn short_headers_are_drawn_in_full() {
        let mut canvas = PdfCanvas::new("test", 210.0, 297.0, 14.0);
        canvas.begin_page(0);
        canvas.draw_header(&HeaderDescriptor::new("Order", vec!["a".into(), "b".into()]));
        assert_eq!(text_sections(&canvas), 3);
    }

    #[test]
    fn drawing_without_a_page_opens_one() {
        let mut canvas = PdfCanvas::new("test", 100.0, 100.0, 5.0);
        canvas.draw_text("orphan", 5.0, 5.0, 6.0);
        assert_eq!(canvas.page_count(), 1);
    }
}
