use std::sync::Arc;

/// Per-glyph metrics in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlyphMetrics {
    /// Horizontal pen advance.
    pub advance: i32,
    /// Offset from the pen position to the bitmap's left edge.
    pub bearing_x: i32,
    /// Offset from the baseline up to the bitmap's top edge.
    pub bearing_y: i32,
    pub width: i32,
    pub height: i32,
}

/// A rasterized 8-bit coverage bitmap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: u16,
    pub height: u16,
    /// Bytes per row.
    pub pitch: u16,
    pub data: Vec<u8>,
}

/// Glyph metrics and rasterization backend.
///
/// Metrics are queried in every compute mode; bitmaps only when the mode
/// rasterizes. Implementations return `None` for glyphs they cannot supply,
/// which the flow engine treats as a zero advance.
pub trait FontEngine {
    fn glyph_metrics(&self, font_index: u16, size_px: i32, codepoint: char) -> Option<GlyphMetrics>;

    fn glyph_bitmap(&self, font_index: u16, size_px: i32, codepoint: char) -> Option<Arc<GlyphBitmap>>;

    /// Distance from the top of the em box to the baseline.
    fn ascent(&self, _font_index: u16, size_px: i32) -> i32 {
        size_px * 4 / 5
    }
}

/// Deterministic fixed-pitch engine for tests, benches and profiling.
///
/// Every printable glyph advances `size * advance_num / advance_den` pixels
/// and rasterizes to a solid box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonospaceFontEngine {
    pub advance_num: i32,
    pub advance_den: i32,
}

impl Default for MonospaceFontEngine {
    fn default() -> Self {
        Self {
            advance_num: 1,
            advance_den: 2,
        }
    }
}

impl MonospaceFontEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance of every printable glyph at `size_px`.
    pub fn advance(&self, size_px: i32) -> i32 {
        (size_px * self.advance_num / self.advance_den.max(1)).max(1)
    }
}

impl FontEngine for MonospaceFontEngine {
    fn glyph_metrics(&self, _font_index: u16, size_px: i32, codepoint: char) -> Option<GlyphMetrics> {
        if codepoint.is_control() {
            return None;
        }
        let advance = self.advance(size_px);
        let ascent = self.ascent(0, size_px);
        Some(GlyphMetrics {
            advance,
            bearing_x: 0,
            bearing_y: ascent,
            width: advance,
            height: ascent,
        })
    }

    fn glyph_bitmap(&self, font_index: u16, size_px: i32, codepoint: char) -> Option<Arc<GlyphBitmap>> {
        let metrics = self.glyph_metrics(font_index, size_px, codepoint)?;
        if codepoint.is_whitespace() {
            return None;
        }
        let width = u16::try_from(metrics.width).ok()?;
        let height = u16::try_from(metrics.height).ok()?;
        Some(Arc::new(GlyphBitmap {
            width,
            height,
            pitch: width,
            data: vec![0xff; usize::from(width) * usize::from(height)],
        }))
    }
}
