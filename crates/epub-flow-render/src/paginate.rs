//! Drives the flow engine over a chapter's item stream.

use std::sync::Arc;

use epub_flow::{CascadeConfig, FlowItem, Format};

use crate::display_list::{DisplayDriver, DisplayList, Point};
use crate::flow::{temporary_indent_px, FlowEngine, FlowImage, PageConfig};
use crate::font::FontEngine;
use crate::mode::ComputeMode;
use crate::page_index::{PageIndex, PageIndexStore, PaginationProfileId};

/// Cancellation hook for long-running pagination.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Pagination failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginateError {
    /// The cancel token fired between items.
    Cancelled,
    /// No page starts at (or the chapter has no item for) this offset.
    OffsetOutOfRange { offset: usize },
    /// A page ended without consuming any item.
    NoProgress { item: usize },
}

impl core::fmt::Display for PaginateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "pagination cancelled"),
            Self::OffsetOutOfRange { offset } => {
                write!(f, "no page starts at byte offset {}", offset)
            }
            Self::NoProgress { item } => {
                write!(f, "page ended without progress at item {}", item)
            }
        }
    }
}

impl std::error::Error for PaginateError {}

/// Paginator options; everything here feeds the profile fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PaginatorOptions {
    pub page: PageConfig,
    /// Supplies the root format (screen margins) of every page.
    pub cascade: CascadeConfig,
    /// Caller-chosen identity of the font engine and its faces.
    pub font_fingerprint: u64,
}

impl PaginatorOptions {
    /// Build options for a target display size.
    pub fn for_display(width: i32, height: i32) -> Self {
        Self {
            page: PageConfig::for_display(width, height),
            cascade: CascadeConfig::for_display(width, height),
            font_fingerprint: 0,
        }
    }
}

/// Where a page begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageStart {
    /// Index of the first item in the chapter's item slice.
    pub item: usize,
    /// Byte offset of that item in the chapter source.
    pub offset: usize,
}

impl PageStart {
    fn at(items: &[FlowItem], item: usize) -> Self {
        Self {
            item,
            offset: items.get(item).map_or(0, FlowItem::offset),
        }
    }
}

/// A page reached by offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PagePosition {
    /// Page number within the chapter.
    pub page: usize,
    pub start: PageStart,
}

/// One laid-out page in DISPLAY mode.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedPage {
    pub start: PageStart,
    /// Start of the following page; `None` on the last page.
    pub next: Option<PageStart>,
    pub display_list: DisplayList,
    /// Extent of the emitted content.
    pub bounds: Option<(Point, Point)>,
}

/// Layout state at a page start, derived only from the items before it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResumeState {
    blocks: Vec<Arc<Format>>,
    para_open: bool,
    has_content: bool,
    pending_indent: Option<i32>,
}

impl ResumeState {
    /// State after every item of `items`.
    pub fn scan(items: &[FlowItem]) -> Self {
        let mut state = Self::default();
        for item in items {
            state.advance(item);
        }
        state
    }

    pub fn advance(&mut self, item: &FlowItem) {
        match item {
            FlowItem::BlockStart { format, .. } => {
                self.blocks.push(Arc::clone(format));
                self.para_open = true;
                self.has_content = false;
                self.pending_indent = None;
            }
            FlowItem::BlockEnd { .. } => {
                self.blocks.pop();
                self.para_open = false;
                self.has_content = false;
                self.pending_indent = None;
            }
            FlowItem::LineBreak {
                format,
                indent_next,
                ..
            } => {
                self.para_open = true;
                self.has_content = true;
                self.pending_indent = indent_next.then(|| temporary_indent_px(format));
            }
            FlowItem::Word { .. } | FlowItem::Char { .. } | FlowItem::Image { .. } => {
                self.para_open = true;
                self.has_content = true;
                self.pending_indent = None;
            }
        }
    }

    /// Open block nesting depth.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    /// Format of the innermost open block.
    pub fn block_format(&self) -> Option<&Format> {
        self.blocks.last().map(|format| format.as_ref())
    }

    /// Whether a page starting here continues a paragraph with content.
    pub fn recover(&self) -> bool {
        self.para_open && self.has_content
    }

    pub fn paragraph_open(&self) -> bool {
        self.para_open
    }

    /// Temporary indent carried over from a forced line break.
    pub fn pending_indent(&self) -> Option<i32> {
        self.pending_indent
    }
}

/// Paginates chapters in LOCATION, MOVE and DISPLAY modes.
///
/// All three modes share one page routine, so the page starts found by
/// [`Paginator::locate`] are exactly those [`Paginator::display_page`]
/// reports through [`RenderedPage::next`].
pub struct Paginator<'f> {
    options: PaginatorOptions,
    fonts: &'f dyn FontEngine,
    root: Format,
    profile: PaginationProfileId,
}

impl<'f> Paginator<'f> {
    pub fn new(options: PaginatorOptions, fonts: &'f dyn FontEngine) -> Self {
        Self {
            options,
            fonts,
            root: Format::root(&options.cascade),
            profile: Self::compute_profile(options),
        }
    }

    fn compute_profile(options: PaginatorOptions) -> PaginationProfileId {
        let payload = format!(
            "{:?}|{:?}|{}",
            options.page, options.cascade, options.font_fingerprint
        );
        PaginationProfileId::from_bytes(payload.as_bytes())
    }

    pub fn options(&self) -> PaginatorOptions {
        self.options
    }

    pub fn profile(&self) -> PaginationProfileId {
        self.profile
    }

    /// Page starts of one chapter.
    pub fn locate<C>(&self, items: &[FlowItem], cancel: &C) -> Result<Vec<PageStart>, PaginateError>
    where
        C: CancelToken + ?Sized,
    {
        let mut engine = FlowEngine::new(self.options.page, ComputeMode::Location, self.fonts);
        let mut pages = Vec::with_capacity(items.len() / 64 + 1);
        let mut resume = ResumeState::default();
        let mut scanned = 0;
        let mut start = 0;
        while start < items.len() {
            for item in &items[scanned..start] {
                resume.advance(item);
            }
            scanned = start;
            pages.push(PageStart::at(items, start));
            match self.layout_page(&mut engine, items, start, &resume, cancel)? {
                Some(next) => start = next,
                None => break,
            }
        }
        Ok(pages)
    }

    /// Lays out the page beginning at `offset` with full emission.
    pub fn display_page(&self, items: &[FlowItem], offset: usize) -> Result<RenderedPage, PaginateError> {
        let mut engine = FlowEngine::new(self.options.page, ComputeMode::Display, self.fonts);
        self.display_with(&mut engine, items, offset)
    }

    /// Lays out the page at `offset` and hands it to `driver`.
    pub fn paint_page(
        &self,
        items: &[FlowItem],
        offset: usize,
        driver: &mut dyn DisplayDriver,
        clear_screen: bool,
        no_full: bool,
    ) -> Result<RenderedPage, PaginateError> {
        let mut engine = FlowEngine::new(self.options.page, ComputeMode::Display, self.fonts);
        let mut page = self.display_with(&mut engine, items, offset)?;
        engine.paint(driver, clear_screen, no_full, true);
        page.display_list = engine.take_display_list();
        Ok(page)
    }

    fn display_with(
        &self,
        engine: &mut FlowEngine<'_>,
        items: &[FlowItem],
        offset: usize,
    ) -> Result<RenderedPage, PaginateError> {
        let start = items
            .binary_search_by_key(&offset, FlowItem::offset)
            .map_err(|_| PaginateError::OffsetOutOfRange { offset })?;
        let resume = ResumeState::scan(&items[..start]);
        let next = self.layout_page(engine, items, start, &resume, &NeverCancel)?;
        Ok(RenderedPage {
            start: PageStart::at(items, start),
            next: next.map(|item| PageStart::at(items, item)),
            display_list: engine.display_list().clone(),
            bounds: engine.bounds(),
        })
    }

    /// Fast-forwards in MOVE mode to the page containing byte `offset`.
    pub fn page_containing(&self, items: &[FlowItem], offset: usize) -> Result<PagePosition, PaginateError> {
        if items.is_empty() {
            return Err(PaginateError::OffsetOutOfRange { offset });
        }
        let target = items
            .partition_point(|item| item.offset() <= offset)
            .saturating_sub(1);
        let mut engine = FlowEngine::new(self.options.page, ComputeMode::Move, self.fonts);
        let mut resume = ResumeState::default();
        let mut scanned = 0;
        let mut start = 0;
        let mut page = 0;
        loop {
            for item in &items[scanned..start] {
                resume.advance(item);
            }
            scanned = start;
            match self.layout_page(&mut engine, items, start, &resume, &NeverCancel)? {
                Some(next) if next <= target => {
                    start = next;
                    page += 1;
                }
                _ => {
                    return Ok(PagePosition {
                        page,
                        start: PageStart::at(items, start),
                    })
                }
            }
        }
    }

    /// Runs LOCATION over every chapter in order.
    pub fn locate_book<I, S, C>(&self, chapters: I, cancel: &C) -> Result<PageIndex, PaginateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[FlowItem]>,
        C: CancelToken + ?Sized,
    {
        let mut index = PageIndex::new(self.profile);
        for chapter in chapters {
            let pages = self.locate(chapter.as_ref(), cancel)?;
            index
                .chapters
                .push(pages.into_iter().map(|page| page.offset).collect());
        }
        Ok(index)
    }

    /// Loads the book index for this profile, or builds and stores it.
    ///
    /// Only a completed, uncancelled pass is persisted.
    pub fn locate_book_cached<I, S, C>(
        &self,
        chapters: I,
        store: &dyn PageIndexStore,
        cancel: &C,
    ) -> Result<PageIndex, PaginateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[FlowItem]>,
        C: CancelToken + ?Sized,
    {
        if let Some(index) = store.load(self.profile) {
            return Ok(index);
        }
        let index = self.locate_book(chapters, cancel)?;
        store.store(&index);
        Ok(index)
    }

    /// Lays out one page from `start`; returns the next page's first item.
    fn layout_page<C>(
        &self,
        engine: &mut FlowEngine<'_>,
        items: &[FlowItem],
        start: usize,
        resume: &ResumeState,
        cancel: &C,
    ) -> Result<Option<usize>, PaginateError>
    where
        C: CancelToken + ?Sized,
    {
        engine.start(&self.root);
        let mut state = resume.clone();
        if state.para_open {
            let format = state.block_format().unwrap_or(&self.root);
            engine.new_paragraph(format, state.has_content);
            if let Some(px) = state.pending_indent {
                engine.set_temporary_indent(px);
            }
        }

        let mut uncommitted: Option<usize> = None;
        for (idx, item) in items.iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                return Err(PaginateError::Cancelled);
            }
            let before = engine.committed_lines();
            let placed = self.place(engine, &state, item);
            let committed = engine.committed_lines() > before;
            if !placed {
                let anchor = if committed {
                    idx
                } else {
                    uncommitted.unwrap_or(idx)
                };
                engine.break_paragraph(item.format());
                if anchor <= start {
                    log::warn!("page at item {} ended without progress", start);
                    return Err(PaginateError::NoProgress { item: start });
                }
                return Ok(Some(anchor));
            }
            state.advance(item);
            if committed {
                uncommitted = None;
            }
            if uncommitted.is_none() && opens_pending(item, engine) {
                uncommitted = Some(idx);
            }
        }

        let format = state.block_format().unwrap_or(&self.root);
        engine.add_line(format, false);
        Ok(None)
    }

    fn place(&self, engine: &mut FlowEngine<'_>, state: &ResumeState, item: &FlowItem) -> bool {
        match item {
            FlowItem::BlockStart { format, .. } => engine.new_paragraph(format, false),
            FlowItem::BlockEnd { format, .. } => engine.end_paragraph(format),
            FlowItem::Word {
                text,
                glued,
                format,
                ..
            } => self.open_paragraph(engine, state) && engine.add_word(text, *glued, format),
            FlowItem::Char { ch, format, .. } => {
                self.open_paragraph(engine, state) && engine.add_char(*ch, format)
            }
            FlowItem::LineBreak {
                format,
                indent_next,
                ..
            } => self.open_paragraph(engine, state) && engine.line_break(format, *indent_next),
            FlowItem::Image {
                src,
                width,
                height,
                format,
                ..
            } => {
                let image = FlowImage {
                    src,
                    width: *width,
                    height: *height,
                };
                self.open_paragraph(engine, state) && engine.add_image(image, format)
            }
        }
    }

    /// Inline content after a nested block continues its parent without
    /// margins or first-line indent.
    fn open_paragraph(&self, engine: &mut FlowEngine<'_>, state: &ResumeState) -> bool {
        if state.para_open {
            return true;
        }
        engine.new_paragraph(state.block_format().unwrap_or(&self.root), true)
    }
}

/// Whether `item`, just placed, belongs to the uncommitted page state.
fn opens_pending(item: &FlowItem, engine: &FlowEngine<'_>) -> bool {
    match item {
        FlowItem::BlockStart { .. } => true,
        FlowItem::Word { .. } | FlowItem::Char { .. } | FlowItem::Image { .. } => {
            engine.pending_items() > 0
        }
        FlowItem::LineBreak { .. } | FlowItem::BlockEnd { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::MonospaceFontEngine;
    use epub_flow::{FlowPrep, FlowPrepOptions};

    fn chapter(html: &str, width: i32, height: i32) -> Vec<FlowItem> {
        let mut prep = FlowPrep::new(FlowPrepOptions::for_display(width, height));
        prep.prepare(html.as_bytes()).unwrap()
    }

    fn paragraphs(count: usize, words: usize) -> String {
        let mut html = String::from("<html><body>");
        for p in 0..count {
            html.push_str("<p>");
            for w in 0..words {
                html.push_str(&format!("word{}x{} ", p, w));
            }
            html.push_str("</p>");
        }
        html.push_str("</body></html>");
        html
    }

    #[test]
    fn resume_state_tracks_blocks_and_indent() {
        let items = chapter("<html><body><div><p>a<br/>b</p></div></body></html>", 300, 300);
        let br = items
            .iter()
            .position(|item| matches!(item, FlowItem::LineBreak { .. }))
            .unwrap();
        let state = ResumeState::scan(&items[..br]);
        assert!(state.recover());
        assert_eq!(state.pending_indent(), None);
        let after = ResumeState::scan(&items[..=br]);
        assert!(after.paragraph_open());
        let closed = ResumeState::scan(&items);
        assert_eq!(closed.depth(), 0);
        assert!(!closed.paragraph_open());
    }

    #[test]
    fn empty_chapter_has_no_pages() {
        let fonts = MonospaceFontEngine::new();
        let paginator = Paginator::new(PaginatorOptions::for_display(300, 300), &fonts);
        assert_eq!(paginator.locate(&[], &NeverCancel), Ok(Vec::new()));
        assert_eq!(
            paginator.page_containing(&[], 0),
            Err(PaginateError::OffsetOutOfRange { offset: 0 })
        );
    }

    #[test]
    fn every_page_consumes_items() {
        let fonts = MonospaceFontEngine::new();
        let items = chapter(&paragraphs(12, 40), 240, 200);
        let paginator = Paginator::new(PaginatorOptions::for_display(240, 200), &fonts);
        let pages = paginator.locate(&items, &NeverCancel).unwrap();
        assert!(pages.len() > 3);
        assert_eq!(pages[0].item, 0);
        assert!(pages.windows(2).all(|pair| pair[0].item < pair[1].item));
    }

    #[test]
    fn display_rejects_offsets_that_are_not_items() {
        let fonts = MonospaceFontEngine::new();
        let items = chapter(&paragraphs(1, 3), 240, 200);
        let paginator = Paginator::new(PaginatorOptions::for_display(240, 200), &fonts);
        let bogus = items.last().map_or(0, FlowItem::offset) + 1000;
        assert_eq!(
            paginator.display_page(&items, bogus),
            Err(PaginateError::OffsetOutOfRange { offset: bogus })
        );
    }

    #[test]
    fn cancellation_aborts_locate() {
        struct Always;
        impl CancelToken for Always {
            fn is_cancelled(&self) -> bool {
                true
            }
        }
        let fonts = MonospaceFontEngine::new();
        let items = chapter(&paragraphs(2, 5), 240, 200);
        let paginator = Paginator::new(PaginatorOptions::for_display(240, 200), &fonts);
        assert_eq!(paginator.locate(&items, &Always), Err(PaginateError::Cancelled));
        assert_eq!(
            paginator.locate_book([items.as_slice()], &Always),
            Err(PaginateError::Cancelled)
        );
    }

    #[test]
    fn profile_follows_options() {
        let fonts = MonospaceFontEngine::new();
        let a = Paginator::new(PaginatorOptions::for_display(240, 200), &fonts);
        let b = Paginator::new(PaginatorOptions::for_display(240, 200), &fonts);
        let c = Paginator::new(
            PaginatorOptions {
                font_fingerprint: 7,
                ..PaginatorOptions::for_display(240, 200)
            },
            &fonts,
        );
        assert_eq!(a.profile(), b.profile());
        assert_ne!(a.profile(), c.profile());
    }
}
