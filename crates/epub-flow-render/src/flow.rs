//! Line filling, vertical fit and page-full detection.

use std::sync::Arc;

use epub_flow::{Align, Format};

use crate::display_list::{
    Dim, DisplayDriver, DisplayList, DisplayListEntry, PaintOptions, Point,
};
use crate::font::{FontEngine, GlyphBitmap};
use crate::mode::{Capabilities, ComputeMode};

/// Physical page geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageConfig {
    /// Page width in pixels.
    pub width: i32,
    /// Page height in pixels.
    pub height: i32,
    /// Device resolution; part of the layout fingerprint.
    pub ppi: u16,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 800,
            ppi: 166,
        }
    }
}

impl PageConfig {
    /// Convenience for a display size with the default resolution.
    pub fn for_display(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

/// Flow engine state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlowState {
    #[default]
    Empty,
    InParagraph,
    LinePending,
    ParagraphEnded,
    PageFull,
}

/// Image placement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowImage<'a> {
    pub src: &'a str,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Region {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Region {
    fn new(page: PageConfig, fmt: &Format) -> Self {
        let left = fmt.screen.left;
        let top = fmt.screen.top;
        Self {
            left,
            top,
            right: (page.width - fmt.screen.right).max(left + 1),
            bottom: (page.height - fmt.screen.bottom).max(top + 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ParagraphGeometry {
    margin_left: i32,
    margin_right: i32,
    indent: i32,
    align: Align,
}

impl ParagraphGeometry {
    fn of(fmt: &Format) -> Self {
        Self {
            margin_left: fmt.margin_left,
            margin_right: fmt.margin_right,
            indent: fmt.indent,
            align: fmt.align,
        }
    }
}

#[derive(Clone, Debug)]
enum Piece {
    Text(String),
    Image(Arc<str>),
}

#[derive(Clone, Debug)]
struct LineItem {
    piece: Piece,
    font_index: u16,
    size: i32,
    shift: i32,
    width: i32,
    /// Natural gap before this item; zero when glued.
    gap: i32,
    height: i32,
    /// Distance from the line top to this item's baseline.
    ascent: i32,
}

/// Temporary indent applied to the line after a forced break.
pub(crate) fn temporary_indent_px(fmt: &Format) -> i32 {
    if fmt.indent > 0 {
        fmt.indent
    } else {
        fmt.font_size
    }
}

/// Splits `slack` pixels over `slots` gaps; the remainder goes to the last.
pub fn distribute_slack(slots: usize, slack: i32) -> Vec<i32> {
    if slots == 0 {
        return Vec::new();
    }
    let count = i32::try_from(slots).unwrap_or(i32::MAX);
    let slack = slack.max(0);
    let mut extras = vec![slack / count; slots];
    if let Some(last) = extras.last_mut() {
        *last += slack % count;
    }
    extras
}

/// Fills lines and pages from flow items.
///
/// Every operation runs the same arithmetic in all compute modes; the mode's
/// [`Capabilities`] only decide whether display-list entries are appended and
/// whether glyph bitmaps are fetched. Operations returning `false` did not
/// place their item: the page cannot take it.
pub struct FlowEngine<'f> {
    page: PageConfig,
    mode: ComputeMode,
    caps: Capabilities,
    fonts: &'f dyn FontEngine,
    list: DisplayList,
    state: FlowState,
    region: Region,
    cursor_y: i32,
    committed: usize,
    para: Option<ParagraphGeometry>,
    first_line: bool,
    temp_indent: i32,
    line: Vec<LineItem>,
    line_width: i32,
    line_height: i32,
    line_ascent: i32,
    extent: Option<(Point, Point)>,
}

impl<'f> FlowEngine<'f> {
    pub fn new(page: PageConfig, mode: ComputeMode, fonts: &'f dyn FontEngine) -> Self {
        Self {
            page,
            mode,
            caps: mode.capabilities(),
            fonts,
            list: DisplayList::new(),
            state: FlowState::Empty,
            region: Region {
                left: 0,
                top: 0,
                right: page.width.max(1),
                bottom: page.height.max(1),
            },
            cursor_y: 0,
            committed: 0,
            para: None,
            first_line: false,
            temp_indent: 0,
            line: Vec::new(),
            line_width: 0,
            line_height: 0,
            line_ascent: 0,
            extent: None,
        }
    }

    pub fn mode(&self) -> ComputeMode {
        self.mode
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn page(&self) -> PageConfig {
        self.page
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Top of the next line.
    pub fn cursor_y(&self) -> i32 {
        self.cursor_y
    }

    /// Lines (including empty ones) committed on this page.
    pub fn committed_lines(&self) -> usize {
        self.committed
    }

    /// Items on the uncommitted line.
    pub fn pending_items(&self) -> usize {
        self.line.len()
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    pub fn take_display_list(&mut self) -> DisplayList {
        std::mem::take(&mut self.list)
    }

    /// Top-left and bottom-right corners reached by emitted content.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        self.extent
    }

    /// Resets to an empty page whose writable region comes from `fmt`.
    pub fn start(&mut self, fmt: &Format) {
        self.region = Region::new(self.page, fmt);
        self.cursor_y = self.region.top;
        self.list.clear();
        self.state = FlowState::Empty;
        self.committed = 0;
        self.para = None;
        self.first_line = false;
        self.temp_indent = 0;
        self.extent = None;
        self.clear_line();
    }

    /// Recomputes the writable region without clearing content.
    pub fn set_limits(&mut self, fmt: &Format) {
        self.region = Region::new(self.page, fmt);
        self.cursor_y = self.cursor_y.max(self.region.top);
    }

    /// Sets the indent of the next line only.
    pub fn set_temporary_indent(&mut self, px: i32) {
        self.temp_indent = px.max(0);
    }

    pub fn new_paragraph(&mut self, fmt: &Format, recover: bool) -> bool {
        if self.state == FlowState::PageFull {
            return false;
        }
        let align = self.current_align(fmt);
        self.flush_line(false, align);
        let margin = if recover { 0 } else { fmt.margin_top.max(0) };
        if self.committed > 0 && self.cursor_y + margin + fmt.line_height() > self.region.bottom {
            self.state = FlowState::PageFull;
            return false;
        }
        if margin > 0 {
            // An empty page always keeps room for one line below the margin.
            let floor = if self.committed == 0 {
                (self.region.bottom - fmt.line_height()).max(self.region.top)
            } else {
                self.region.bottom
            };
            self.cursor_y = (self.cursor_y + margin).min(floor).max(self.cursor_y);
        }
        self.para = Some(ParagraphGeometry::of(fmt));
        self.first_line = !recover;
        self.temp_indent = 0;
        self.state = FlowState::InParagraph;
        true
    }

    pub fn add_word(&mut self, word: &str, glued: bool, fmt: &Format) -> bool {
        let width = self.measure(word, fmt);
        let gap = if glued { 0 } else { self.space_width(fmt) };
        let (height, ascent) = self.text_extent(fmt);
        self.place(
            LineItem {
                piece: Piece::Text(word.to_string()),
                font_index: fmt.font_index,
                size: fmt.font_size,
                shift: fmt.baseline_shift,
                width,
                gap,
                height,
                ascent,
            },
            fmt,
        )
    }

    /// Adds one preformatted character; no gap is inserted before it.
    pub fn add_char(&mut self, ch: char, fmt: &Format) -> bool {
        let mut text = String::new();
        text.push(ch);
        let width = self.measure(&text, fmt);
        let (height, ascent) = self.text_extent(fmt);
        self.place(
            LineItem {
                piece: Piece::Text(text),
                font_index: fmt.font_index,
                size: fmt.font_size,
                shift: fmt.baseline_shift,
                width,
                gap: 0,
                height,
                ascent,
            },
            fmt,
        )
    }

    /// Adds an image scaled down to the writable region. Images without
    /// known dimensions are skipped.
    pub fn add_image(&mut self, image: FlowImage<'_>, fmt: &Format) -> bool {
        let (Some(width), Some(height)) = (image.width, image.height) else {
            log::debug!("skipping image without dimensions: {}", image.src);
            return true;
        };
        if width <= 0 || height <= 0 {
            log::debug!("skipping empty image: {}", image.src);
            return true;
        }
        let (width, height) = self.fit_image(fmt, width, height);
        self.place(
            LineItem {
                piece: Piece::Image(Arc::from(image.src)),
                font_index: fmt.font_index,
                size: fmt.font_size,
                shift: 0,
                width,
                gap: 0,
                height,
                ascent: height,
            },
            fmt,
        )
    }

    /// Commits the pending line with `fmt`'s alignment.
    pub fn add_line(&mut self, fmt: &Format, justifyable: bool) -> bool {
        if self.state == FlowState::PageFull {
            return false;
        }
        self.flush_line(justifyable, fmt.align);
        true
    }

    pub fn line_break(&mut self, fmt: &Format, indent_next_line: bool) -> bool {
        if self.state == FlowState::PageFull {
            return false;
        }
        if self.line.is_empty() {
            let height = fmt.line_height();
            if !self.fits(height) {
                self.state = FlowState::PageFull;
                return false;
            }
            self.cursor_y += height;
            self.committed += 1;
        } else {
            let align = self.current_align(fmt);
            self.flush_line(false, align);
        }
        if indent_next_line {
            self.temp_indent = temporary_indent_px(fmt);
        }
        self.state = FlowState::InParagraph;
        true
    }

    /// Closes the paragraph. The bottom margin is clamped to the region, so
    /// this only returns `false` when the page was already full.
    pub fn end_paragraph(&mut self, fmt: &Format) -> bool {
        if self.state == FlowState::PageFull {
            return false;
        }
        let align = self.current_align(fmt);
        self.flush_line(false, align);
        if self.cursor_y < self.region.bottom {
            self.cursor_y = (self.cursor_y + fmt.margin_bottom.max(0)).min(self.region.bottom);
        }
        self.para = None;
        self.first_line = false;
        self.temp_indent = 0;
        self.state = FlowState::ParagraphEnded;
        true
    }

    /// Drops the uncommitted line and marks the page full.
    pub fn break_paragraph(&mut self, _fmt: &Format) {
        self.clear_line();
        self.state = FlowState::PageFull;
    }

    pub fn is_full(&self) -> bool {
        self.state == FlowState::PageFull
    }

    pub fn paint(
        &self,
        driver: &mut dyn DisplayDriver,
        clear_screen: bool,
        no_full: bool,
        do_it: bool,
    ) {
        if !self.caps.paint || !do_it {
            return;
        }
        driver.paint(
            &self.list,
            PaintOptions {
                clear_screen,
                no_full,
            },
        );
    }

    pub fn put_highlight(&mut self, dim: Dim, pos: Point) {
        self.emit(DisplayListEntry::Highlight { dim, pos });
    }

    pub fn clear_highlight(&mut self, dim: Dim, pos: Point) {
        self.emit(DisplayListEntry::ClearHighlight { dim, pos });
    }

    pub fn put_region(&mut self, dim: Dim, pos: Point) {
        self.emit(DisplayListEntry::Region { dim, pos });
    }

    pub fn set_region(&mut self, dim: Dim, pos: Point) {
        self.emit(DisplayListEntry::SetRegion { dim, pos });
    }

    fn emit(&mut self, entry: DisplayListEntry) {
        if self.caps.emit {
            self.list.push(entry);
        }
    }

    fn current_align(&self, fmt: &Format) -> Align {
        self.para.map_or(fmt.align, |para| para.align)
    }

    fn fits(&self, height: i32) -> bool {
        self.committed == 0 || self.cursor_y + height <= self.region.bottom
    }

    fn line_left(&self) -> i32 {
        let para = self.para.unwrap_or(ParagraphGeometry {
            margin_left: 0,
            margin_right: 0,
            indent: 0,
            align: Align::Left,
        });
        let indent = if self.first_line { para.indent } else { 0 };
        self.region.left + para.margin_left + indent + self.temp_indent
    }

    fn line_right(&self) -> i32 {
        let margin_right = self.para.map_or(0, |para| para.margin_right);
        self.region.right - margin_right
    }

    fn available(&self) -> i32 {
        (self.line_right() - self.line_left()).max(1)
    }

    fn measure(&self, text: &str, fmt: &Format) -> i32 {
        text.chars()
            .map(|ch| self.advance(fmt.font_index, fmt.font_size, ch))
            .sum()
    }

    fn advance(&self, font_index: u16, size: i32, ch: char) -> i32 {
        self.fonts
            .glyph_metrics(font_index, size, ch)
            .map_or(0, |metrics| metrics.advance)
    }

    fn space_width(&self, fmt: &Format) -> i32 {
        self.advance(fmt.font_index, fmt.font_size, ' ')
    }

    fn text_extent(&self, fmt: &Format) -> (i32, i32) {
        let height = fmt.line_height();
        let leading = (height - fmt.font_size).max(0) / 2;
        (height, leading + self.fonts.ascent(fmt.font_index, fmt.font_size))
    }

    fn fit_image(&self, fmt: &Format, width: i32, height: i32) -> (i32, i32) {
        let max_width = (self.region.right - self.region.left - fmt.margin_left - fmt.margin_right).max(1);
        let max_height = (self.region.bottom - self.region.top).max(1);
        let (mut width, mut height) = (i64::from(width), i64::from(height));
        if width > i64::from(max_width) {
            height = (height * i64::from(max_width) / width).max(1);
            width = i64::from(max_width);
        }
        if height > i64::from(max_height) {
            width = (width * i64::from(max_height) / height).max(1);
            height = i64::from(max_height);
        }
        (
            i32::try_from(width).unwrap_or(max_width),
            i32::try_from(height).unwrap_or(max_height),
        )
    }

    fn place(&mut self, item: LineItem, fmt: &Format) -> bool {
        if self.state == FlowState::PageFull {
            return false;
        }
        if self.para.is_none() {
            self.para = Some(ParagraphGeometry::of(fmt));
            self.first_line = false;
        }
        if !self.line.is_empty() && self.line_width + item.gap + item.width > self.available() {
            let align = self.current_align(fmt);
            self.flush_line(true, align);
        }
        let gap = if self.line.is_empty() { 0 } else { item.gap };
        let height = self.line_height.max(item.height);
        if !self.fits(height) {
            self.state = FlowState::PageFull;
            return false;
        }
        self.line_width += gap + item.width;
        self.line_height = height;
        self.line_ascent = self.line_ascent.max(item.ascent);
        self.line.push(item);
        self.state = FlowState::LinePending;
        true
    }

    fn clear_line(&mut self) {
        self.line.clear();
        self.line_width = 0;
        self.line_height = 0;
        self.line_ascent = 0;
    }

    fn flush_line(&mut self, justify: bool, align: Align) {
        if self.line.is_empty() {
            return;
        }
        if self.caps.emit {
            self.emit_line(justify, align);
        }
        self.cursor_y += self.line_height;
        self.committed += 1;
        self.first_line = false;
        self.temp_indent = 0;
        self.clear_line();
        if self.state != FlowState::PageFull {
            self.state = FlowState::InParagraph;
        }
    }

    fn emit_line(&mut self, justify: bool, align: Align) {
        let left = self.line_left();
        let slack = (self.available() - self.line_width).max(0);
        let slots: Vec<usize> = self
            .line
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, item)| item.gap > 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut extras = vec![0; self.line.len()];
        let start = match align {
            Align::Left => left,
            Align::Right => left + slack,
            Align::Center => left + slack / 2,
            Align::Justify => {
                if justify {
                    for (slot, extra) in slots.iter().zip(distribute_slack(slots.len(), slack)) {
                        extras[*slot] = extra;
                    }
                }
                left
            }
        };
        let baseline = self.cursor_y + self.line_ascent;
        let line = std::mem::take(&mut self.line);
        let mut pen = start;
        for (idx, item) in line.iter().enumerate() {
            if idx > 0 && item.gap > 0 {
                let gap = item.gap + extras[idx];
                self.push_glyph(None, ' ', Point::new(pen, baseline - item.ascent), true, gap, item.height);
                pen += gap;
            }
            match &item.piece {
                Piece::Text(text) => {
                    for ch in text.chars() {
                        let metrics = self.fonts.glyph_metrics(item.font_index, item.size, ch);
                        let Some(metrics) = metrics else {
                            continue;
                        };
                        let is_space = ch.is_whitespace();
                        let glyph = if self.caps.rasterize && !is_space {
                            self.fonts.glyph_bitmap(item.font_index, item.size, ch)
                        } else {
                            None
                        };
                        let pos = Point::new(
                            pen + metrics.bearing_x,
                            baseline + item.shift - metrics.bearing_y,
                        );
                        self.push_glyph(glyph, ch, pos, is_space, metrics.width, metrics.height);
                        pen += metrics.advance;
                    }
                }
                Piece::Image(src) => {
                    let pos = Point::new(pen, baseline - item.height);
                    self.list.push(DisplayListEntry::Image {
                        image: Arc::clone(src),
                        dim: Dim::new(item.width, item.height),
                        pos,
                        advance: item.width,
                    });
                    self.grow_extent(pos, item.width, item.height);
                    pen += item.width;
                }
            }
        }
        self.line = line;
    }

    fn push_glyph(
        &mut self,
        glyph: Option<Arc<GlyphBitmap>>,
        ch: char,
        pos: Point,
        is_space: bool,
        width: i32,
        height: i32,
    ) {
        self.list.push(DisplayListEntry::Glyph {
            glyph,
            ch,
            pos,
            is_space,
        });
        if !is_space {
            self.grow_extent(pos, width, height);
        }
    }

    fn grow_extent(&mut self, pos: Point, width: i32, height: i32) {
        let far = Point::new(pos.x + width, pos.y + height);
        self.extent = Some(match self.extent {
            None => (pos, far),
            Some((min, max)) => (
                Point::new(min.x.min(pos.x), min.y.min(pos.y)),
                Point::new(max.x.max(far.x), max.y.max(far.y)),
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::MonospaceFontEngine;
    use epub_flow::CascadeConfig;

    fn format(width: i32, height: i32) -> Format {
        let mut fmt = Format::root(&CascadeConfig::for_display(width, height));
        fmt.line_height_factor = 1.0;
        fmt
    }

    #[test]
    fn slack_remainder_goes_to_last_gap() {
        assert_eq!(distribute_slack(3, 11), vec![3, 3, 5]);
        assert_eq!(distribute_slack(0, 11), Vec::<i32>::new());
        assert_eq!(distribute_slack(2, -4), vec![0, 0]);
    }

    #[test]
    fn start_places_cursor_at_top_margin() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 200);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 200), ComputeMode::Display, &fonts);
        engine.start(&fmt);
        assert_eq!(engine.cursor_y(), fmt.screen.top);
        assert_eq!(engine.state(), FlowState::Empty);
    }

    #[test]
    fn overflowing_word_commits_pending_line() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Location, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        // 160px available, 8px per glyph: 20 glyphs per line.
        assert!(engine.add_word("aaaaaaaaaa", false, &fmt));
        assert!(engine.add_word("bbbbbbbbb", false, &fmt));
        assert_eq!(engine.committed_lines(), 0);
        assert!(engine.add_word("c", false, &fmt));
        assert_eq!(engine.committed_lines(), 1);
        assert_eq!(engine.pending_items(), 1);
    }

    #[test]
    fn too_wide_word_sits_alone() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Location, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.add_word("a", false, &fmt));
        assert!(engine.add_word(&"w".repeat(40), false, &fmt));
        assert_eq!(engine.committed_lines(), 1);
        assert!(engine.add_word("b", false, &fmt));
        assert_eq!(engine.committed_lines(), 2);
    }

    #[test]
    fn first_line_on_empty_page_always_fits() {
        let fonts = MonospaceFontEngine::new();
        let mut fmt = format(200, 60);
        fmt.font_size = 40;
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 60), ComputeMode::Location, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.add_word("big", false, &fmt));
        assert!(engine.end_paragraph(&fmt));
        assert!(!engine.new_paragraph(&fmt, false));
    }

    #[test]
    fn margin_bottom_is_truncated_at_page_bottom() {
        let fonts = MonospaceFontEngine::new();
        let mut fmt = format(200, 100);
        fmt.margin_bottom = 500;
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 100), ComputeMode::Location, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.add_word("x", false, &fmt));
        assert!(engine.end_paragraph(&fmt));
        assert_eq!(engine.cursor_y(), 100 - fmt.screen.bottom);
    }

    #[test]
    fn break_paragraph_drops_pending_line() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Display, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.add_word("lost", false, &fmt));
        engine.break_paragraph(&fmt);
        assert!(engine.is_full());
        assert_eq!(engine.pending_items(), 0);
        assert!(engine.display_list().is_empty());
        assert!(!engine.add_word("more", false, &fmt));
    }

    #[test]
    fn location_mode_emits_nothing() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Location, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.add_word("quiet", false, &fmt));
        assert!(engine.end_paragraph(&fmt));
        engine.put_highlight(Dim::new(10, 10), Point::default());
        assert!(engine.display_list().is_empty());
        assert_eq!(engine.committed_lines(), 1);
    }

    #[test]
    fn line_break_sets_temporary_indent() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Display, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        assert!(engine.line_break(&fmt, true));
        assert!(engine.add_word("x", false, &fmt));
        assert!(engine.end_paragraph(&fmt));
        let first = engine.display_list().entries().first().cloned();
        match first {
            Some(DisplayListEntry::Glyph { pos, .. }) => {
                assert_eq!(pos.x, fmt.screen.left + fmt.font_size)
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn images_without_dimensions_are_skipped() {
        let fonts = MonospaceFontEngine::new();
        let fmt = format(200, 400);
        let mut engine = FlowEngine::new(PageConfig::for_display(200, 400), ComputeMode::Display, &fonts);
        engine.start(&fmt);
        assert!(engine.new_paragraph(&fmt, false));
        let missing = FlowImage {
            src: "cover.png",
            width: None,
            height: Some(10),
        };
        assert!(engine.add_image(missing, &fmt));
        assert_eq!(engine.pending_items(), 0);
        let wide = FlowImage {
            src: "wide.png",
            width: Some(800),
            height: Some(100),
        };
        assert!(engine.add_image(wide, &fmt));
        assert!(engine.end_paragraph(&fmt));
        match engine.display_list().entries() {
            [DisplayListEntry::Image { dim, .. }] => assert_eq!(*dim, Dim::new(160, 20)),
            other => panic!("unexpected entries: {other:?}"),
        }
    }
}
