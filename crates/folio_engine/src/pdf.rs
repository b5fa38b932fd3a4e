//! Paginated PDF layout of an [`Article`].
//!
//! Text is set in an embedded TrueType font when one can be found, so
//! Cyrillic, Greek and other non-Latin scripts survive. Without one the
//! built-in Helvetica is used and characters outside Latin-1 become `?`.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};

use folio_logging::{folio_debug, folio_warn};

use crate::article::{Article, Block, ImageRef};
use crate::export::{ExportError, ImageError, SkippedImage};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const USABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const USABLE_HEIGHT_MM: f32 = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM;
const PT_TO_MM: f32 = 0.352_778;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.52;
/// Natural image size is computed at screen resolution.
const SCREEN_DPI: f32 = 96.0;
/// printpdf maps one pixel to `25.4 / dpi` mm before scaling.
const EMBED_DPI: f32 = 300.0;

const TITLE_PT: f32 = 18.0;
const META_PT: f32 = 9.0;
const H1_PT: f32 = 14.0;
const HEADING_PT: f32 = 12.0;
const BODY_PT: f32 = 11.0;
const CAPTION_PT: f32 = 9.0;

/// Unicode TrueType fonts shipped by common desktop and server installs.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Which characters the chosen font can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    Latin1,
    Unicode,
}

impl Coverage {
    fn prepare(self, text: &str) -> String {
        match self {
            Coverage::Latin1 => pdf_safe_text(text),
            Coverage::Unicode => text
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        }
    }
}

/// The configured font first, then the known system locations.
fn font_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

pub(crate) struct PdfRender {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub images_embedded: usize,
    pub images_skipped: Vec<SkippedImage>,
}

pub(crate) fn render_pdf(article: &Article, font: Option<&Path>) -> Result<PdfRender, ExportError> {
    let mut layout = Layout::new(&article.title, font)?;
    let mut images_embedded = 0;
    let mut images_skipped = Vec::new();

    layout.text_block(&article.title, TITLE_PT, 0.0, 6.0);

    let meta_line = meta_line(article);
    if !meta_line.is_empty() {
        layout.text_block(&meta_line, META_PT, 0.0, 6.0);
    }

    for block in &article.blocks {
        match block {
            Block::Heading { level, text } => {
                let size = if *level <= 1 { H1_PT } else { HEADING_PT };
                layout.text_block(text, size, 0.0, 6.0);
            }
            Block::Paragraph(text) => layout.text_block(text, BODY_PT, 0.0, 8.0),
            Block::Image(image) => match decode_image(image) {
                Ok(decoded) => {
                    layout.image(decoded);
                    images_embedded += 1;
                    if let Some(caption) = &image.caption {
                        layout.text_block(caption, CAPTION_PT, 4.0 * PT_TO_MM, 6.0);
                    }
                }
                Err(reason) => {
                    folio_warn!("skipping image {}: {}", image.url, reason);
                    images_skipped.push(SkippedImage {
                        url: image.url.clone(),
                        reason,
                    });
                }
            },
        }
    }

    let page_count = layout.pages;
    let bytes = layout.finish()?;
    Ok(PdfRender {
        bytes,
        page_count,
        images_embedded,
        images_skipped,
    })
}

fn meta_line(article: &Article) -> String {
    let mut info = Vec::new();
    if let Some(author) = &article.author {
        info.push(format!("By {author}"));
    }
    if let Some(published) = &article.published {
        info.push(published.display());
    }
    if let Some(tags) = &article.tags {
        info.push(format!("Tags: {tags}"));
    }
    info.join("  |  ")
}

fn decode_image(image: &ImageRef) -> Result<DynamicImage, ImageError> {
    let payload = image.payload.as_ref().ok_or(ImageError::NotDownloaded)?;
    let decoded =
        image::load_from_memory(payload).map_err(|err| ImageError::Decode(err.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ImageError::Decode("image has no pixels".to_string()));
    }
    // Alpha channels are not carried into the PDF; flatten to RGB.
    Ok(DynamicImage::ImageRgb8(decoded.to_rgb8()))
}

struct Layout {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    coverage: Coverage,
    /// Distance of the cursor from the bottom edge, in mm.
    cursor_mm: f32,
    pages: usize,
    page_has_content: bool,
}

impl Layout {
    fn new(title: &str, configured_font: Option<&Path>) -> Result<Self, ExportError> {
        let (doc, page, layer) = PdfDocument::new(
            pdf_safe_text(title),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Page 1",
        );
        let (font, coverage) = match embed_font(&doc, configured_font) {
            Some(font) => (font, Coverage::Unicode),
            None => {
                let font = doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|err| ExportError::Pdf(err.to_string()))?;
                (font, Coverage::Latin1)
            }
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            font,
            coverage,
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
            pages: 1,
            page_has_content: false,
        })
    }

    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
        self.page_has_content = false;
    }

    /// Starts a new page unless `height_mm` still fits above the bottom margin.
    fn reserve(&mut self, height_mm: f32) {
        if self.cursor_mm - height_mm < MARGIN_MM && self.page_has_content {
            self.new_page();
        }
        self.page_has_content = true;
    }

    fn text_block(&mut self, text: &str, size_pt: f32, indent_mm: f32, gap_after_pt: f32) {
        let line_mm = size_pt * PT_TO_MM;
        let leading_mm = 2.0 * PT_TO_MM;
        let text = self.coverage.prepare(text);
        for line in wrap_text(&text, size_pt, USABLE_WIDTH_MM - indent_mm) {
            self.reserve(line_mm + leading_mm);
            self.cursor_mm -= line_mm;
            self.layer.use_text(
                line,
                size_pt,
                Mm(MARGIN_MM + indent_mm),
                Mm(self.cursor_mm),
                &self.font,
            );
            self.cursor_mm -= leading_mm;
        }
        self.cursor_mm -= gap_after_pt * PT_TO_MM;
    }

    fn image(&mut self, decoded: DynamicImage) {
        let (px_w, px_h) = (decoded.width() as f32, decoded.height() as f32);
        let natural_w_mm = px_w * 25.4 / SCREEN_DPI;
        let mut width_mm = natural_w_mm.min(USABLE_WIDTH_MM);
        let mut height_mm = width_mm * px_h / px_w;
        if height_mm > USABLE_HEIGHT_MM {
            height_mm = USABLE_HEIGHT_MM;
            width_mm = height_mm * px_w / px_h;
        }

        self.reserve(height_mm);
        let embedded_w_mm = px_w * 25.4 / EMBED_DPI;
        let embedded_h_mm = px_h * 25.4 / EMBED_DPI;
        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_MM)),
                translate_y: Some(Mm(self.cursor_mm - height_mm)),
                scale_x: Some(width_mm / embedded_w_mm),
                scale_y: Some(height_mm / embedded_h_mm),
                dpi: Some(EMBED_DPI),
                ..Default::default()
            },
        );
        self.cursor_mm -= height_mm + 6.0 * PT_TO_MM;
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut writer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut writer)
            .map_err(|err| ExportError::Pdf(err.to_string()))?;
        writer
            .into_inner()
            .map_err(|err| ExportError::Pdf(err.to_string()))
    }
}

/// First candidate font that loads, or `None` for the built-in fallback.
fn embed_font(doc: &PdfDocumentReference, configured: Option<&Path>) -> Option<IndirectFontRef> {
    for path in font_candidates(configured) {
        if !path.is_file() {
            if configured.is_some_and(|c| c == path) {
                folio_warn!("pdf font {} not found", path.display());
            }
            continue;
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                folio_warn!("could not read pdf font {}: {}", path.display(), err);
                continue;
            }
        };
        match doc.add_external_font(bytes.as_slice()) {
            Ok(font) => {
                folio_debug!("embedding pdf font {}", path.display());
                return Some(font);
            }
            Err(err) => folio_warn!("unusable pdf font {}: {}", path.display(), err),
        }
    }
    folio_warn!("no unicode font found; non Latin-1 text will print as '?'");
    None
}

/// Width of `c` in average-glyph units; East Asian wide characters take two.
fn glyph_units(c: char) -> usize {
    match c as u32 {
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6 => 2,
        _ => 1,
    }
}

fn units(text: &str) -> usize {
    text.chars().map(glyph_units).sum()
}

/// Greedy word wrap using an average glyph width; overlong words are split.
fn wrap_text(text: &str, size_pt: f32, width_mm: f32) -> Vec<String> {
    let glyph_mm = size_pt * AVG_GLYPH_EM * PT_TO_MM;
    let max_units = ((width_mm / glyph_mm).floor() as usize).max(1);

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while units(&word) > max_units {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut taken = 0;
            let split = word
                .char_indices()
                .find(|(_, c)| {
                    taken += glyph_units(*c);
                    taken > max_units
                })
                .map_or(word.len(), |(idx, _)| idx.max(word.chars().next().map_or(1, char::len_utf8)));
            let rest = word.split_off(split);
            lines.push(std::mem::replace(&mut word, rest));
        }
        if word.is_empty() {
            continue;
        }
        let needed = units(&current) + usize::from(!current.is_empty()) + units(&word);
        if needed > max_units && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Built-in PDF fonts only cover Latin-1; typographic punctuation is mapped to
/// ASCII and anything else becomes `?`.
fn pdf_safe_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            '\u{2026}' => '.',
            '\u{00A0}' | '\u{2002}'..='\u{200A}' => ' ',
            c if (c as u32) < 0x20 => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_keeps_words() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        // 11pt over 20mm fits 9 characters per line.
        let lines = wrap_text(text, 11.0, 20.0);
        assert!(lines.iter().all(|line| line.chars().count() <= 9));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn overlong_word_is_split() {
        let lines = wrap_text("abcdefghijklmnopqrstuvwxyz", 11.0, 20.0);
        assert_eq!(lines, vec!["abcdefghi", "jklmnopqr", "stuvwxyz"]);
    }

    #[test]
    fn unsupported_characters_are_replaced() {
        assert_eq!(
            pdf_safe_text("\u{201C}caf\u{e9}\u{201D} \u{2014} \u{65e5}"),
            "\"caf\u{e9}\" - ?"
        );
    }

    #[test]
    fn wide_characters_take_two_columns() {
        // 9 columns per line: four wide glyphs fit, a fifth does not.
        let lines = wrap_text("\u{65e5}\u{672c}\u{8a9e}\u{306e}\u{6587}\u{7ae0}", 11.0, 20.0);
        assert_eq!(lines, vec!["\u{65e5}\u{672c}\u{8a9e}\u{306e}", "\u{6587}\u{7ae0}"]);
    }

    #[test]
    fn embedded_font_keeps_non_latin_text() {
        let text = "\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442}, \u{3ba}\u{3cc}\u{3c3}\u{3bc}\u{3b5}\u{3c2}";
        assert_eq!(Coverage::Unicode.prepare(text), text);
        assert_eq!(Coverage::Latin1.prepare(text), "??????, ??????");
        assert_eq!(Coverage::Unicode.prepare("a\tb"), "a b");
    }

    #[test]
    fn configured_font_is_tried_first() {
        let configured = Path::new("/opt/fonts/Custom.ttf");
        let candidates = font_candidates(Some(configured));
        assert_eq!(candidates[0], configured);
        assert_eq!(candidates.len(), SYSTEM_FONTS.len() + 1);
        assert_eq!(font_candidates(None).len(), SYSTEM_FONTS.len());
    }

    #[test]
    fn meta_line_joins_present_fields() {
        let article = Article {
            title: "t".into(),
            author: Some("Ann".into()),
            published: None,
            tags: Some("x".into()),
            lead_image: None,
            source_url: String::new(),
            blocks: Vec::new(),
        };
        assert_eq!(meta_line(&article), "By Ann  |  Tags: x");
    }
}
