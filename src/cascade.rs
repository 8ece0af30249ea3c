//! Cascade resolution: matched rules in, fully resolved [`Format`] out.

use crate::document::ElementPath;
use crate::properties::{Property, PropertyId, NORMAL_LINE_HEIGHT};
use crate::rule_store::{merge_in_cascade_order, FontFaceSource, RuleStore};
use crate::values::{
    Align, DisplayKind, FontStyle, FontWeight, ResolveContext, TextTransform, Unit, Value,
    VerticalAlign,
};

/// The four page margins outside the writable region, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScreenMargins {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

/// Device and normalization settings for style resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeConfig {
    /// Device resolution in pixels per inch.
    pub ppi: u16,
    /// Physical page width in pixels.
    pub page_width: i32,
    /// Physical page height in pixels.
    pub page_height: i32,
    /// Root font size in pixels.
    pub base_font_size_px: f32,
    /// Lower clamp for resolved font sizes.
    pub min_font_size_px: f32,
    /// Upper clamp for resolved font sizes.
    pub max_font_size_px: f32,
    /// Root line-height multiplier.
    pub line_height: f32,
    /// Margins between the page edge and the writable region.
    pub screen_margins: ScreenMargins,
}

impl CascadeConfig {
    /// Convenience for a display size with default margins and fonts.
    pub fn for_display(width: i32, height: i32) -> Self {
        Self {
            page_width: width,
            page_height: height,
            ..Self::default()
        }
    }

    /// Width of the writable region before element margins.
    pub fn content_width(&self) -> i32 {
        (self.page_width - self.screen_margins.left - self.screen_margins.right).max(1)
    }

    /// Height of the writable region.
    pub fn content_height(&self) -> i32 {
        (self.page_height - self.screen_margins.top - self.screen_margins.bottom).max(1)
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            ppi: 166,
            page_width: 480,
            page_height: 800,
            base_font_size_px: 16.0,
            min_font_size_px: 6.0,
            max_font_size_px: 72.0,
            line_height: NORMAL_LINE_HEIGHT,
            screen_margins: ScreenMargins {
                top: 24,
                bottom: 24,
                left: 20,
                right: 20,
            },
        }
    }
}

/// Combined weight and slant; selects the face within a family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontVariant {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    pub fn new(weight: FontWeight, style: FontStyle) -> Self {
        match (weight, style) {
            (FontWeight::Normal, FontStyle::Normal) => Self::Normal,
            (FontWeight::Bold, FontStyle::Normal) => Self::Bold,
            (FontWeight::Normal, FontStyle::Italic) => Self::Italic,
            (FontWeight::Bold, FontStyle::Italic) => Self::BoldItalic,
        }
    }

    pub fn weight(self) -> FontWeight {
        match self {
            Self::Bold | Self::BoldItalic => FontWeight::Bold,
            Self::Normal | Self::Italic => FontWeight::Normal,
        }
    }

    pub fn style(self) -> FontStyle {
        match self {
            Self::Italic | Self::BoldItalic => FontStyle::Italic,
            Self::Normal | Self::Bold => FontStyle::Normal,
        }
    }

    fn with_weight(self, weight: FontWeight) -> Self {
        Self::new(weight, self.style())
    }

    fn with_style(self, style: FontStyle) -> Self {
        Self::new(self.weight(), style)
    }
}

/// Fully resolved style of one element.
#[derive(Clone, Debug, PartialEq)]
pub struct Format {
    /// Font engine index chosen by the [`FontResolver`].
    pub font_index: u16,
    /// Family the font index was resolved from.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: i32,
    pub font_variant: FontVariant,
    pub align: Align,
    pub text_transform: TextTransform,
    pub margin_top: i32,
    pub margin_bottom: i32,
    /// Accumulated left margin of this element and all its ancestors.
    pub margin_left: i32,
    /// Accumulated right margin of this element and all its ancestors.
    pub margin_right: i32,
    /// First-line indent in pixels.
    pub indent: i32,
    pub vertical_align: VerticalAlign,
    /// Baseline shift in pixels, positive downwards.
    pub baseline_shift: i32,
    pub display: DisplayKind,
    pub line_height_factor: f32,
    pub screen: ScreenMargins,
    /// Collapse and trim whitespace.
    pub trim: bool,
    /// Preformatted text: whitespace and newlines are kept.
    pub pre: bool,
    /// Explicit width in pixels (images).
    pub width: Option<i32>,
    /// Explicit height in pixels (images).
    pub height: Option<i32>,
}

impl Format {
    /// Format of the document root, before any rule applies.
    pub fn root(config: &CascadeConfig) -> Self {
        Self {
            font_index: GenericFontResolver::SERIF,
            font_family: "serif".to_string(),
            font_size: clamp_font_size(config, config.base_font_size_px),
            font_variant: FontVariant::Normal,
            align: Align::Left,
            text_transform: TextTransform::None,
            margin_top: 0,
            margin_bottom: 0,
            margin_left: 0,
            margin_right: 0,
            indent: 0,
            vertical_align: VerticalAlign::Baseline,
            baseline_shift: 0,
            display: DisplayKind::Block,
            line_height_factor: config.line_height,
            screen: config.screen_margins,
            trim: true,
            pre: false,
            width: None,
            height: None,
        }
    }

    /// Starting point for a child: inherited fields copied, the rest reset.
    fn inherit(&self) -> Self {
        Self {
            margin_top: 0,
            margin_bottom: 0,
            vertical_align: VerticalAlign::Baseline,
            baseline_shift: 0,
            display: DisplayKind::Inline,
            width: None,
            height: None,
            ..self.clone()
        }
    }

    /// Line height in pixels.
    pub fn line_height(&self) -> i32 {
        ((self.font_size as f32) * self.line_height_factor).round().max(1.0) as i32
    }
}

/// Maps a font family and variant to a font engine index.
pub trait FontResolver {
    /// Index for `family`, or `None` when this resolver does not know it.
    fn resolve(&self, family: &str, variant: FontVariant) -> Option<u16>;

    /// Index used when no family in the stack resolves.
    fn fallback(&self) -> u16 {
        GenericFontResolver::SERIF
    }
}

/// Generic families plus faces declared by `@font-face`.
///
/// Generic families map to fixed indices; embedded faces are numbered after
/// them in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenericFontResolver {
    faces: Vec<FontFaceSource>,
}

impl GenericFontResolver {
    pub const SERIF: u16 = 0;
    pub const SANS_SERIF: u16 = 1;
    pub const MONOSPACE: u16 = 2;
    /// Index of the first embedded face.
    pub const FIRST_EMBEDDED: u16 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver knowing every `@font-face` of `store`.
    pub fn from_store(store: &RuleStore) -> Self {
        Self {
            faces: store.font_face_sources(),
        }
    }

    pub fn faces(&self) -> &[FontFaceSource] {
        &self.faces
    }
}

impl FontResolver for GenericFontResolver {
    fn resolve(&self, family: &str, variant: FontVariant) -> Option<u16> {
        let family = family.trim();
        let generic = match family.to_ascii_lowercase().as_str() {
            "serif" => Some(Self::SERIF),
            "sans-serif" | "sans" => Some(Self::SANS_SERIF),
            "monospace" => Some(Self::MONOSPACE),
            _ => None,
        };
        if generic.is_some() {
            return generic;
        }
        let mut family_match = None;
        for (idx, face) in self.faces.iter().enumerate() {
            if !face.family.eq_ignore_ascii_case(family) {
                continue;
            }
            let index = Self::FIRST_EMBEDDED.saturating_add(u16::try_from(idx).ok()?);
            if face.weight == variant.weight() && face.style == variant.style() {
                return Some(index);
            }
            family_match.get_or_insert(index);
        }
        family_match
    }
}

/// Resolves the cascade for elements of one document session.
#[derive(Clone, Debug)]
pub struct Cascade<'a, F = GenericFontResolver> {
    store: &'a RuleStore,
    config: CascadeConfig,
    fonts: F,
}

impl<'a> Cascade<'a, GenericFontResolver> {
    /// Cascade over `store`, resolving fonts against its `@font-face` rules.
    pub fn new(store: &'a RuleStore, config: CascadeConfig) -> Self {
        Self {
            store,
            config,
            fonts: GenericFontResolver::from_store(store),
        }
    }
}

impl<'a, F: FontResolver> Cascade<'a, F> {
    pub fn with_font_resolver<G: FontResolver>(self, fonts: G) -> Cascade<'a, G> {
        Cascade {
            store: self.store,
            config: self.config,
            fonts,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn store(&self) -> &'a RuleStore {
        self.store
    }

    /// Root format with the root family resolved through this cascade's fonts.
    pub fn root_format(&self) -> Format {
        let mut fmt = Format::root(&self.config);
        fmt.font_index = self
            .fonts
            .resolve(&fmt.font_family, fmt.font_variant)
            .unwrap_or_else(|| self.fonts.fallback());
        fmt
    }

    /// Resolve the subject of `path` given its parent's format.
    ///
    /// Rules from the session store and from `inline` (the element's parsed
    /// `style=` attribute) are merged in cascade order; `!important`
    /// declarations are applied after all normal ones.
    pub fn resolve(&self, path: &ElementPath<'_>, parent: &Format, inline: Option<&RuleStore>) -> Format {
        let mut matched = self.store.matching_rules(path);
        if let Some(inline) = inline {
            matched.extend(inline.matching_rules(path));
        }
        let merged = merge_in_cascade_order(&mut matched);
        let tag = path.subject().map(|e| e.tag.as_str()).unwrap_or("");
        self.apply(&merged.properties, parent, tag)
    }

    fn apply(&self, props: &[Property], parent: &Format, tag: &str) -> Format {
        let mut fmt = parent.inherit();
        if matches!(tag, "pre" | "listing" | "xmp" | "textarea") {
            fmt.pre = true;
            fmt.trim = false;
        }

        // Own font size first: every other em value depends on it.
        if let Some(prop) = props.iter().rev().find(|p| p.id == PropertyId::FontSize) {
            if let Some(px) = self.font_size_px(&prop.values, parent) {
                fmt.font_size = px;
            }
        }
        let ctx = self.length_context(fmt.font_size);

        let mut family_stack: Option<&[Value]> = None;
        let mut own_margin_left = 0;
        let mut own_margin_right = 0;
        for prop in props {
            let values = prop.values.as_slice();
            match prop.id {
                PropertyId::FontFamily => family_stack = Some(values),
                PropertyId::FontSize | PropertyId::Src => {}
                PropertyId::FontWeight => {
                    if let [Value::Weight(w)] = values {
                        fmt.font_variant = fmt.font_variant.with_weight(*w);
                    }
                }
                PropertyId::FontStyle => {
                    if let [Value::Style(s)] = values {
                        fmt.font_variant = fmt.font_variant.with_style(*s);
                    }
                }
                PropertyId::TextAlign => {
                    if let [Value::Align(a)] = values {
                        fmt.align = *a;
                    }
                }
                PropertyId::TextTransform => {
                    if let [Value::Transform(t)] = values {
                        fmt.text_transform = *t;
                    }
                }
                PropertyId::TextIndent => {
                    if let Some(px) = values.first().and_then(|v| v.to_px(&ctx)) {
                        fmt.indent = px;
                    }
                }
                PropertyId::LineHeight => {
                    if let Some(factor) = line_height_factor(values, &ctx, fmt.font_size) {
                        fmt.line_height_factor = factor;
                    }
                }
                PropertyId::Margin => {
                    if let Some([top, right, bottom, left]) = expand_box(values, &ctx) {
                        fmt.margin_top = top;
                        own_margin_right = right;
                        fmt.margin_bottom = bottom;
                        own_margin_left = left;
                    }
                }
                PropertyId::MarginTop => fmt.margin_top = margin_px(values, &ctx),
                PropertyId::MarginBottom => fmt.margin_bottom = margin_px(values, &ctx),
                PropertyId::MarginLeft => own_margin_left = margin_px(values, &ctx),
                PropertyId::MarginRight => own_margin_right = margin_px(values, &ctx),
                PropertyId::Width => fmt.width = values.first().and_then(|v| v.to_px(&ctx)),
                PropertyId::Height => {
                    let ctx = ctx.with_reference(self.config.content_height() as f32);
                    fmt.height = values.first().and_then(|v| v.to_px(&ctx));
                }
                PropertyId::VerticalAlign => match values {
                    [Value::VerticalAlign(mode)] => {
                        fmt.vertical_align = *mode;
                        fmt.baseline_shift = match mode {
                            VerticalAlign::Sub => parent.font_size / 4,
                            VerticalAlign::Super => -(parent.font_size / 3),
                            _ => 0,
                        };
                    }
                    [v] => {
                        fmt.vertical_align = VerticalAlign::Baseline;
                        let ctx = ctx.with_reference(fmt.line_height() as f32);
                        fmt.baseline_shift = v.to_px(&ctx).map_or(0, |px| -px);
                    }
                    _ => {}
                },
                PropertyId::Display => {
                    if let [Value::Display(d)] = values {
                        fmt.display = *d;
                    }
                }
            }
        }
        fmt.margin_left = parent.margin_left.saturating_add(own_margin_left);
        fmt.margin_right = parent.margin_right.saturating_add(own_margin_right);

        if let Some(stack) = family_stack {
            self.resolve_family(&mut fmt, stack);
        } else if fmt.font_variant != parent.font_variant {
            self.resolve_family(&mut fmt, &[Value::Str(parent.font_family.clone())]);
        }
        fmt
    }

    fn resolve_family(&self, fmt: &mut Format, stack: &[Value]) {
        for value in stack {
            let (Value::Str(family) | Value::Ident(family)) = value else {
                continue;
            };
            if let Some(index) = self.fonts.resolve(family, fmt.font_variant) {
                fmt.font_index = index;
                fmt.font_family.clone_from(family);
                return;
            }
        }
        fmt.font_index = self.fonts.fallback();
    }

    fn font_size_px(&self, values: &[Value], parent: &Format) -> Option<i32> {
        let [Value::Number { value, unit }] = values else {
            return None;
        };
        let parent_px = parent.font_size as f32;
        let ctx = self
            .length_context(parent.font_size)
            .with_reference(parent_px);
        let px = match unit {
            Unit::Percent => value * parent_px / 100.0,
            _ => ctx.length_px_f32(*value, *unit)?,
        };
        Some(clamp_font_size(&self.config, px))
    }

    fn length_context(&self, font_size: i32) -> ResolveContext {
        ResolveContext {
            ppi: self.config.ppi,
            font_size_px: font_size as f32,
            root_font_size_px: self.config.base_font_size_px,
            reference_px: self.config.content_width() as f32,
            viewport_width_px: self.config.page_width as f32,
            viewport_height_px: self.config.page_height as f32,
        }
    }
}

fn clamp_font_size(config: &CascadeConfig, px: f32) -> i32 {
    px.clamp(config.min_font_size_px, config.max_font_size_px).round() as i32
}

fn margin_px(values: &[Value], ctx: &ResolveContext) -> i32 {
    values.first().and_then(|v| v.to_px(ctx)).unwrap_or(0)
}

/// Expand the 1-4 value `margin` shorthand to top, right, bottom, left.
fn expand_box(values: &[Value], ctx: &ResolveContext) -> Option<[i32; 4]> {
    let px = |v: &Value| v.to_px(ctx).unwrap_or(0);
    match values {
        [all] => Some([px(all); 4]),
        [vertical, horizontal] => {
            let (v, h) = (px(vertical), px(horizontal));
            Some([v, h, v, h])
        }
        [top, horizontal, bottom] => {
            let h = px(horizontal);
            Some([px(top), h, px(bottom), h])
        }
        [top, right, bottom, left] => Some([px(top), px(right), px(bottom), px(left)]),
        _ => None,
    }
}

fn line_height_factor(values: &[Value], ctx: &ResolveContext, font_size: i32) -> Option<f32> {
    let [Value::Number { value, unit }] = values else {
        return None;
    };
    let factor = match unit {
        Unit::None => *value,
        Unit::Percent => value / 100.0,
        _ => ctx.length_px_f32(*value, *unit)? / (font_size.max(1) as f32),
    };
    (factor.is_finite() && factor > 0.0).then_some(factor)
}
