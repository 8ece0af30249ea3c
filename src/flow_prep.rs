//! XHTML walker turning a chapter into the flat [`FlowItem`] stream the
//! pagination engine consumes.

use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::cascade::{Cascade, CascadeConfig, Format};
use crate::css_parser::{CssParser, StyleLimits};
use crate::document::{ElementDescriptor, ElementLevel, ElementPath};
use crate::error::{CssDiagnostic, ErrorPhase, StyleError};
use crate::rule_store::RuleStore;
use crate::values::{DisplayKind, TextTransform};

/// Chapter preparation options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowPrepOptions {
    /// Stylesheet and walker limits.
    pub style: StyleLimits,
    /// Device settings for the cascade.
    pub cascade: CascadeConfig,
}

impl FlowPrepOptions {
    pub fn for_display(width: i32, height: i32) -> Self {
        Self {
            cascade: CascadeConfig::for_display(width, height),
            ..Self::default()
        }
    }
}

/// One unit of chapter content with the byte offset it starts at.
///
/// Offsets are strictly increasing within a chapter; a page index is a list
/// of the offsets pages start at.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowItem {
    /// A block element opens.
    BlockStart { format: Arc<Format>, offset: usize },
    /// The innermost open block closes.
    BlockEnd { format: Arc<Format>, offset: usize },
    /// A word of running text.
    Word {
        text: String,
        /// No inter-word gap before this word.
        glued: bool,
        format: Arc<Format>,
        offset: usize,
    },
    /// A single preformatted character, spaces included.
    Char {
        ch: char,
        format: Arc<Format>,
        offset: usize,
    },
    /// Forced line break (`<br/>` or a newline in preformatted text).
    LineBreak {
        format: Arc<Format>,
        offset: usize,
        indent_next: bool,
    },
    /// Inline image reference.
    Image {
        src: String,
        width: Option<i32>,
        height: Option<i32>,
        format: Arc<Format>,
        offset: usize,
    },
}

impl FlowItem {
    pub fn offset(&self) -> usize {
        match self {
            Self::BlockStart { offset, .. }
            | Self::BlockEnd { offset, .. }
            | Self::Word { offset, .. }
            | Self::Char { offset, .. }
            | Self::LineBreak { offset, .. }
            | Self::Image { offset, .. } => *offset,
        }
    }

    pub fn format(&self) -> &Format {
        match self {
            Self::BlockStart { format, .. }
            | Self::BlockEnd { format, .. }
            | Self::Word { format, .. }
            | Self::Char { format, .. }
            | Self::LineBreak { format, .. }
            | Self::Image { format, .. } => format,
        }
    }
}

/// Chapter walker holding the session's rule store.
#[derive(Clone, Debug)]
pub struct FlowPrep {
    options: FlowPrepOptions,
    store: RuleStore,
    parser: CssParser,
}

impl FlowPrep {
    /// Walker preloaded with the user-agent sheet.
    pub fn new(options: FlowPrepOptions) -> Self {
        Self {
            options,
            store: RuleStore::user_agent(),
            parser: CssParser::new().with_limits(options.style),
        }
    }

    pub fn options(&self) -> &FlowPrepOptions {
        &self.options
    }

    /// Session rule store: user-agent rules plus every added stylesheet.
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Add a linked stylesheet; it applies to every later chapter.
    pub fn add_stylesheet(&mut self, css: &str, source: &str) -> Result<(), StyleError> {
        self.parser.parse_into(&mut self.store, css, source)
    }

    /// CSS problems recovered from so far.
    pub fn diagnostics(&self) -> &[CssDiagnostic] {
        self.parser.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> Vec<CssDiagnostic> {
        self.parser.take_diagnostics()
    }

    /// Prepare a chapter into a vector.
    pub fn prepare(&mut self, xhtml: &[u8]) -> Result<Vec<FlowItem>, StyleError> {
        let mut items = Vec::with_capacity(xhtml.len() / 6);
        self.prepare_with(xhtml, |item| items.push(item))?;
        Ok(items)
    }

    /// Prepare a chapter, streaming each item to `on_item`.
    ///
    /// `<style>` elements of the chapter are applied to this chapter only.
    pub fn prepare_with<F>(&mut self, xhtml: &[u8], on_item: F) -> Result<(), StyleError>
    where
        F: FnMut(FlowItem),
    {
        let embedded = embedded_stylesheets(xhtml)?;
        let chapter_store;
        let store = if embedded.is_empty() {
            &self.store
        } else {
            let mut store = self.store.clone();
            for css in &embedded {
                self.parser.parse_into(&mut store, css, "<style>")?;
            }
            chapter_store = store;
            &chapter_store
        };
        let cascade = Cascade::new(store, self.options.cascade);
        let mut walker = Walker::new(&cascade, &mut self.parser, self.options.style, on_item);
        walker.run(xhtml)
    }
}

/// `href`s of `<link rel="stylesheet">` elements, in document order.
pub fn linked_stylesheets(xhtml: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_reader(xhtml);
    let mut buf = Vec::with_capacity(64);
    let mut out = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if decode_tag_name(&reader, e.name().as_ref()).ok().as_deref() != Some("link") {
                    buf.clear();
                    continue;
                }
                let mut rel = String::new();
                let mut href = None;
                for attr in e.attributes().flatten() {
                    let Ok(val) = reader.decoder().decode(&attr.value) else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"rel" => rel = val.to_ascii_lowercase(),
                        b"href" => href = Some(val.into_owned()),
                        _ => {}
                    }
                }
                if let Some(href) = href {
                    if rel.split_whitespace().any(|r| r == "stylesheet") {
                        out.push(href);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
        buf.clear();
    }
    out
}

/// Text of every `<style>` element, in document order.
fn embedded_stylesheets(xhtml: &[u8]) -> Result<Vec<String>, StyleError> {
    let mut reader = Reader::from_reader(xhtml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(64);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if decode_tag_name(&reader, e.name().as_ref())? == "style" {
                    current = Some(String::new());
                }
            }
            Ok(Event::End(e)) => {
                if decode_tag_name(&reader, e.name().as_ref())? == "style" {
                    if let Some(css) = current.take() {
                        out.push(css);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(css) = current.as_mut() {
                    css.push_str(&e.decode().map_err(|err| decode_error(&reader, "style text", err))?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(css) = current.as_mut() {
                    let text = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|err| decode_error(&reader, "style cdata", err))?;
                    css.push_str(&text);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(css) = current.as_mut() {
                    let name = e.decode().map_err(|err| decode_error(&reader, "style entity", err))?;
                    css.push_str(&resolve_entity(&reader, &name)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(&reader, err)),
        }
        buf.clear();
    }
    Ok(out)
}

/// One open element.
struct Frame {
    format: Arc<Format>,
    block: bool,
    /// Counter for `<ol>`; `None` for `<ul>` and non-list elements.
    ordinal: Option<u32>,
    list: bool,
}

struct Walker<'c, 's, F> {
    cascade: &'c Cascade<'s>,
    parser: &'c mut CssParser,
    limits: StyleLimits,
    on_item: F,
    levels: Vec<ElementLevel>,
    frames: Vec<Frame>,
    /// Last closed element child per depth; index 0 is the document level.
    last_child: Vec<Option<ElementDescriptor>>,
    root: Arc<Format>,
    skip_depth: usize,
    nesting_overflow: usize,
    last_offset: Option<usize>,
    space_pending: bool,
    after_word: bool,
}

impl<'c, 's, F: FnMut(FlowItem)> Walker<'c, 's, F> {
    fn new(
        cascade: &'c Cascade<'s>,
        parser: &'c mut CssParser,
        limits: StyleLimits,
        on_item: F,
    ) -> Self {
        Self {
            root: Arc::new(cascade.root_format()),
            cascade,
            parser,
            limits,
            on_item,
            levels: Vec::with_capacity(16),
            frames: Vec::with_capacity(16),
            last_child: vec![None],
            skip_depth: 0,
            nesting_overflow: 0,
            last_offset: None,
            space_pending: false,
            after_word: false,
        }
    }

    fn run(&mut self, xhtml: &[u8]) -> Result<(), StyleError> {
        let mut reader = Reader::from_reader(xhtml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::with_capacity(64);
        let mut entity_buf = String::with_capacity(16);
        loop {
            let start = reader_token_offset(&reader);
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if self.skip_depth > 0 || should_skip_tag(&tag) {
                        self.skip_depth += 1;
                    } else {
                        self.open(&reader, &e, tag, start)?;
                    }
                }
                Ok(Event::Empty(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if self.skip_depth == 0 && !should_skip_tag(&tag) {
                        self.open(&reader, &e, tag.clone(), start)?;
                        if self.skip_depth > 0 {
                            self.skip_depth -= 1;
                        } else {
                            self.close(&tag, start);
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if self.skip_depth > 0 {
                        self.skip_depth -= 1;
                    } else {
                        self.close(&tag, start);
                    }
                }
                Ok(Event::Text(e)) => {
                    if self.skip_depth == 0 {
                        let text = e.decode().map_err(|err| decode_error(&reader, "text node", err))?;
                        self.text(&text, start);
                    }
                }
                Ok(Event::CData(e)) => {
                    if self.skip_depth == 0 {
                        let text = reader
                            .decoder()
                            .decode(&e)
                            .map_err(|err| decode_error(&reader, "cdata", err))?;
                        // Content starts after `<![CDATA[`.
                        self.text(&text, start + 9);
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if self.skip_depth == 0 {
                        let name = e.decode().map_err(|err| decode_error(&reader, "entity", err))?;
                        entity_buf.clear();
                        entity_buf.push_str(&resolve_entity(&reader, &name)?);
                        self.text_glued(&entity_buf, start);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(xml_error(&reader, err)),
            }
            buf.clear();
        }
        Ok(())
    }

    fn current_format(&self) -> Arc<Format> {
        self.frames
            .last()
            .map_or_else(|| Arc::clone(&self.root), |f| Arc::clone(&f.format))
    }

    fn open(
        &mut self,
        reader: &Reader<&[u8]>,
        e: &BytesStart<'_>,
        tag: String,
        offset: usize,
    ) -> Result<(), StyleError> {
        if self.frames.len() >= self.limits.max_nesting {
            self.nesting_overflow += 1;
            log::warn!(
                "Element nesting depth {} exceeds max_nesting ({}); flattening style",
                self.frames.len() + self.nesting_overflow,
                self.limits.max_nesting
            );
            return Ok(());
        }
        let attrs = ElementAttrs::from_start(reader, e, tag)?;
        let depth = self.levels.len();
        let mut level = ElementLevel::new(attrs.descriptor.clone());
        if let Some(prev) = self.last_child.get(depth).cloned().flatten() {
            level = level.with_previous_sibling(prev);
        }
        self.levels.push(level);
        self.last_child.push(None);

        let inline = attrs
            .descriptor
            .inline_style
            .as_deref()
            .map(|style| self.parser.parse_inline(&attrs.descriptor.tag, style));
        let parent = self.current_format();
        let format = self
            .cascade
            .resolve(&ElementPath::new(&self.levels), &parent, inline.as_ref());

        if format.display == DisplayKind::None {
            // Treated as a skipped subtree; the caller closes it.
            self.levels.pop();
            self.last_child.pop();
            self.skip_depth += 1;
            return Ok(());
        }

        let format = Arc::new(format);
        let tag = attrs.descriptor.tag.as_str();
        let block = format.display.is_block();
        let list = matches!(tag, "ul" | "ol");
        let ordinal = (tag == "ol").then_some(0);
        if block {
            self.emit(
                |format, offset| FlowItem::BlockStart { format, offset },
                &format,
                offset,
            );
            self.space_pending = false;
            self.after_word = false;
        }
        if tag == "li" || format.display == DisplayKind::ListItem {
            self.list_marker(&format, offset);
        }
        match tag {
            "br" => {
                self.emit(
                    |format, offset| FlowItem::LineBreak {
                        format,
                        offset,
                        indent_next: false,
                    },
                    &format,
                    offset,
                );
                self.space_pending = false;
                self.after_word = false;
            }
            "img" | "image" => {
                if let Some(src) = attrs.src {
                    let width = format.width.or(attrs.width);
                    let height = format.height.or(attrs.height);
                    self.emit(
                        |format, offset| FlowItem::Image {
                            src,
                            width,
                            height,
                            format,
                            offset,
                        },
                        &format,
                        offset,
                    );
                    self.after_word = false;
                }
            }
            _ => {}
        }
        self.frames.push(Frame {
            format,
            block,
            ordinal,
            list,
        });
        Ok(())
    }

    fn close(&mut self, tag: &str, offset: usize) {
        if self.nesting_overflow > 0 {
            self.nesting_overflow -= 1;
            return;
        }
        let Some(level) = self.levels.last() else {
            return;
        };
        if level.element.tag != tag {
            log::warn!("mismatched </{}> inside <{}>", tag, level.element.tag);
            return;
        }
        let Some(level) = self.levels.pop() else {
            return;
        };
        self.last_child.pop();
        if let Some(slot) = self.last_child.last_mut() {
            *slot = Some(level.element);
        }
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if frame.block {
            self.emit(
                |format, offset| FlowItem::BlockEnd { format, offset },
                &frame.format,
                offset,
            );
            self.space_pending = false;
            self.after_word = false;
        }
    }

    fn list_marker(&mut self, format: &Arc<Format>, offset: usize) {
        let Some(list) = self.frames.iter_mut().rev().find(|f| f.list) else {
            return;
        };
        let marker = match list.ordinal.as_mut() {
            Some(n) => {
                *n = n.saturating_add(1);
                format!("{}.", n)
            }
            None => "\u{2022}".to_string(),
        };
        self.emit(
            |format, offset| FlowItem::Word {
                text: marker,
                glued: false,
                format,
                offset,
            },
            format,
            offset,
        );
        self.space_pending = true;
        self.after_word = true;
    }

    fn text(&mut self, text: &str, offset: usize) {
        let format = self.current_format();
        if format.pre {
            self.pre_text(text, &format, offset);
            return;
        }
        let mut word_start: Option<usize> = None;
        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(start) = word_start.take() {
                    self.word(&text[start..idx], &format, offset + start);
                }
                self.space_pending = true;
            } else if word_start.is_none() {
                word_start = Some(idx);
            }
        }
        if let Some(start) = word_start {
            self.word(&text[start..], &format, offset + start);
        }
    }

    /// Entity text always continues the current word.
    fn text_glued(&mut self, text: &str, offset: usize) {
        let format = self.current_format();
        if format.pre {
            self.pre_text(text, &format, offset);
        } else if text.chars().all(char::is_whitespace) {
            self.space_pending = true;
        } else {
            self.text(text, offset);
        }
    }

    fn word(&mut self, raw: &str, format: &Arc<Format>, offset: usize) {
        let glued = self.after_word && !self.space_pending;
        let text = transform(raw, format.text_transform, glued);
        self.emit(
            |format, offset| FlowItem::Word {
                text,
                glued,
                format,
                offset,
            },
            format,
            offset,
        );
        self.space_pending = false;
        self.after_word = true;
    }

    fn pre_text(&mut self, text: &str, format: &Arc<Format>, offset: usize) {
        for (idx, ch) in text.char_indices() {
            match ch {
                '\r' => {}
                '\n' => self.emit(
                    |format, offset| FlowItem::LineBreak {
                        format,
                        offset,
                        indent_next: false,
                    },
                    format,
                    offset + idx,
                ),
                '\t' => self.emit(
                    |format, offset| FlowItem::Char {
                        ch: ' ',
                        format,
                        offset,
                    },
                    format,
                    offset + idx,
                ),
                ch => self.emit(
                    |format, offset| FlowItem::Char { ch, format, offset },
                    format,
                    offset + idx,
                ),
            }
        }
        self.after_word = false;
        self.space_pending = false;
    }

    /// Emit with the offset clamped so offsets stay strictly increasing.
    fn emit<B>(&mut self, build: B, format: &Arc<Format>, candidate: usize)
    where
        B: FnOnce(Arc<Format>, usize) -> FlowItem,
    {
        let offset = match self.last_offset {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last_offset = Some(offset);
        (self.on_item)(build(Arc::clone(format), offset));
    }
}

/// Attributes the walker reads from an element.
struct ElementAttrs {
    descriptor: ElementDescriptor,
    src: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
}

impl ElementAttrs {
    fn from_start(reader: &Reader<&[u8]>, e: &BytesStart<'_>, tag: String) -> Result<Self, StyleError> {
        let mut descriptor = ElementDescriptor::new(tag);
        let mut src = None;
        let mut width = None;
        let mut height = None;
        for attr in e.attributes().flatten() {
            let key = match reader.decoder().decode(attr.key.as_ref()) {
                Ok(v) => v.to_ascii_lowercase(),
                Err(_) => continue,
            };
            let val = reader
                .decoder()
                .decode(&attr.value)
                .map_err(|err| decode_error(reader, "attribute value", err))?;
            let val = quick_xml::escape::unescape(&val)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| val.to_string());
            match key.as_str() {
                "class" => descriptor = descriptor.with_classes(&val),
                "id" => descriptor = descriptor.with_id(val),
                "style" => descriptor = descriptor.with_inline_style(val),
                "src" | "href" | "xlink:href" if !val.is_empty() => src = Some(val),
                "width" => width = parse_dimension_hint_px(&val),
                "height" => height = parse_dimension_hint_px(&val),
                _ => {}
            }
        }
        if !matches!(descriptor.tag.as_str(), "img" | "image") {
            src = None;
        }
        Ok(Self {
            descriptor,
            src,
            width,
            height,
        })
    }
}

fn transform(word: &str, mode: TextTransform, glued: bool) -> String {
    match mode {
        TextTransform::None => word.to_string(),
        TextTransform::Uppercase => word.to_uppercase(),
        TextTransform::Lowercase => word.to_lowercase(),
        TextTransform::Capitalize if !glued => {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        TextTransform::Capitalize => word.to_string(),
    }
}

fn parse_dimension_hint_px(raw: &str) -> Option<i32> {
    let trimmed = raw.trim().trim_end_matches("px").trim();
    let parsed = trimmed.parse::<i32>().ok()?;
    (parsed > 0).then_some(parsed)
}

fn should_skip_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "head" | "noscript" | "title")
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, StyleError> {
    let decoded = reader
        .decoder()
        .decode(raw)
        .map_err(|err| decode_error(reader, "tag name", err))?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn resolve_entity(reader: &Reader<&[u8]>, name: &str) -> Result<String, StyleError> {
    let entity = format!("&{};", name);
    match quick_xml::escape::unescape(&entity) {
        Ok(text) => Ok(text.into_owned()),
        Err(err) => {
            // Unknown named entities (HTML-only names) are kept verbatim.
            log::warn!(
                "unresolved entity {} at byte {}: {:?}",
                entity,
                reader_token_offset(reader),
                err
            );
            Ok(entity)
        }
    }
}

fn decode_error(reader: &Reader<&[u8]>, what: &str, err: impl core::fmt::Debug) -> StyleError {
    StyleError::new_with_phase(
        ErrorPhase::Prep,
        "PREP_DECODE_ERROR",
        format!("Decode error: {:?}", err),
    )
    .with_source(format!("{} decode", what))
    .with_token_offset(reader_token_offset(reader))
}

fn xml_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> StyleError {
    StyleError::new_with_phase(
        ErrorPhase::Prep,
        "PREP_XML_ERROR",
        format!("XML error: {:?}", err),
    )
    .with_source("xml tokenizer")
    .with_token_offset(reader_token_offset(reader))
}
