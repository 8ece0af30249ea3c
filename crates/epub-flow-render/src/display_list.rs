use std::sync::Arc;

use crate::font::GlyphBitmap;

/// Page-relative position in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dim {
    pub width: i32,
    pub height: i32,
}

impl Dim {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// One positioned drawing command.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayListEntry {
    /// A glyph; `pos` is the top-left of its bitmap. `glyph` is `None` for
    /// spaces and when the pass does not rasterize.
    Glyph {
        glyph: Option<Arc<GlyphBitmap>>,
        ch: char,
        pos: Point,
        is_space: bool,
    },
    /// An image reference; `pos` is its top-left corner.
    Image {
        image: Arc<str>,
        dim: Dim,
        pos: Point,
        advance: i32,
    },
    Highlight { dim: Dim, pos: Point },
    ClearHighlight { dim: Dim, pos: Point },
    /// Interactive region (link target, selection span).
    Region { dim: Dim, pos: Point },
    SetRegion { dim: Dim, pos: Point },
}

/// Ordered drawing commands of one page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    entries: Vec<DisplayListEntry>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DisplayListEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DisplayListEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayListEntry> {
        self.entries.iter()
    }

    /// Concatenated characters of every glyph entry, spaces included.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                DisplayListEntry::Glyph { ch, .. } => Some(*ch),
                _ => None,
            })
            .collect()
    }
}

/// Flags for one paint call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintOptions {
    /// Clear the panel before drawing.
    pub clear_screen: bool,
    /// Prefer a partial refresh over a full one.
    pub no_full: bool,
}

/// Consumer of finished display lists, such as a panel driver.
pub trait DisplayDriver {
    fn paint(&mut self, list: &DisplayList, options: PaintOptions);
}
