//! Typed CSS values and unit resolution.

use core::fmt;

/// Unit attached to a numeric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Bare number, e.g. `0` or a `line-height` factor.
    None,
    Px,
    Pt,
    Pc,
    Em,
    Ex,
    Rem,
    Ch,
    Percent,
    Cm,
    Mm,
    In,
    Vw,
    Vh,
    Vmin,
    Vmax,
    Deg,
    Rad,
    Grad,
    Ms,
    S,
    Hz,
    Khz,
}

impl Unit {
    /// Map a unit suffix (ASCII case-insensitive) to a known unit.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let unit = match suffix.to_ascii_lowercase().as_str() {
            "px" => Self::Px,
            "pt" => Self::Pt,
            "pc" => Self::Pc,
            "em" => Self::Em,
            "ex" => Self::Ex,
            "rem" => Self::Rem,
            "ch" => Self::Ch,
            "%" => Self::Percent,
            "cm" => Self::Cm,
            "mm" => Self::Mm,
            "in" => Self::In,
            "vw" => Self::Vw,
            "vh" => Self::Vh,
            "vmin" => Self::Vmin,
            "vmax" => Self::Vmax,
            "deg" => Self::Deg,
            "rad" => Self::Rad,
            "grad" => Self::Grad,
            "ms" => Self::Ms,
            "s" => Self::S,
            "hz" => Self::Hz,
            "khz" => Self::Khz,
            _ => return None,
        };
        Some(unit)
    }

    /// Whether values in this unit can be resolved to pixels.
    pub fn is_length(self) -> bool {
        !matches!(
            self,
            Self::Deg | Self::Rad | Self::Grad | Self::Ms | Self::S | Self::Hz | Self::Khz
        )
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Px => "px",
            Self::Pt => "pt",
            Self::Pc => "pc",
            Self::Em => "em",
            Self::Ex => "ex",
            Self::Rem => "rem",
            Self::Ch => "ch",
            Self::Percent => "%",
            Self::Cm => "cm",
            Self::Mm => "mm",
            Self::In => "in",
            Self::Vw => "vw",
            Self::Vh => "vh",
            Self::Vmin => "vmin",
            Self::Vmax => "vmax",
            Self::Deg => "deg",
            Self::Rad => "rad",
            Self::Grad => "grad",
            Self::Ms => "ms",
            Self::S => "s",
            Self::Hz => "hz",
            Self::Khz => "khz",
        }
    }
}

/// Horizontal text alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Align {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

/// `text-transform` choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

/// Font weight, collapsed to the two weights e-ink fonts ship with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Font slant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Box generation mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayKind {
    #[default]
    Inline,
    Block,
    InlineBlock,
    ListItem,
    None,
}

impl DisplayKind {
    /// Whether the element opens its own block in the flow.
    pub fn is_block(self) -> bool {
        matches!(self, Self::Block | Self::ListItem)
    }
}

/// `vertical-align` keyword.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VerticalAlign {
    #[default]
    Baseline,
    Sub,
    Super,
    Top,
    Middle,
    Bottom,
    TextTop,
    TextBottom,
}

/// A single typed CSS term.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number { value: f32, unit: Unit },
    Str(String),
    Ident(String),
    Url(String),
    Function { name: String, args: Vec<Value> },
    Align(Align),
    Transform(TextTransform),
    Weight(FontWeight),
    Style(FontStyle),
    Display(DisplayKind),
    VerticalAlign(VerticalAlign),
}

impl Value {
    pub fn number(value: f32, unit: Unit) -> Self {
        Self::Number { value, unit }
    }

    /// Keyword text for idents, `None` otherwise.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Resolve a length or percentage to whole pixels.
    ///
    /// Returns `None` for values that are not lengths (keywords, angles,
    /// times, ...). A bare number resolves as pixels, which covers `0`.
    pub fn to_px(&self, ctx: &ResolveContext) -> Option<i32> {
        match self {
            Self::Number { value, unit } => ctx.length_px(*value, *unit),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number { value, unit } => write!(f, "{}{}", value, unit.suffix()),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Ident(s) => write!(f, "{}", s),
            Self::Url(s) => write!(f, "url({})", s),
            Self::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Self::Align(v) => write!(f, "{:?}", v),
            Self::Transform(v) => write!(f, "{:?}", v),
            Self::Weight(v) => write!(f, "{:?}", v),
            Self::Style(v) => write!(f, "{:?}", v),
            Self::Display(v) => write!(f, "{:?}", v),
            Self::VerticalAlign(v) => write!(f, "{:?}", v),
        }
    }
}

/// Inputs needed to turn relative units into device pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolveContext {
    /// Device resolution in pixels per inch.
    pub ppi: u16,
    /// Font size (px) `em`, `ex` and `ch` are relative to.
    pub font_size_px: f32,
    /// Root element font size (px) for `rem`.
    pub root_font_size_px: f32,
    /// Reference length (px) for percentages.
    pub reference_px: f32,
    /// Viewport width (px) for `vw`/`vmin`/`vmax`.
    pub viewport_width_px: f32,
    /// Viewport height (px) for `vh`/`vmin`/`vmax`.
    pub viewport_height_px: f32,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            ppi: 166,
            font_size_px: 16.0,
            root_font_size_px: 16.0,
            reference_px: 0.0,
            viewport_width_px: 0.0,
            viewport_height_px: 0.0,
        }
    }
}

impl ResolveContext {
    /// Same context with a different `em` base.
    pub fn with_font_size(mut self, font_size_px: f32) -> Self {
        self.font_size_px = font_size_px;
        self
    }

    /// Same context with a different percentage reference.
    pub fn with_reference(mut self, reference_px: f32) -> Self {
        self.reference_px = reference_px;
        self
    }

    /// Unrounded pixel length, used where fractions matter (font sizes).
    pub fn length_px_f32(&self, value: f32, unit: Unit) -> Option<f32> {
        let ppi = self.ppi as f32;
        let px = match unit {
            Unit::None | Unit::Px => value,
            Unit::Pt => value * ppi / 72.0,
            Unit::Pc => value * 12.0 * ppi / 72.0,
            Unit::In => value * ppi,
            Unit::Cm => value * ppi / 2.54,
            Unit::Mm => value * ppi / 25.4,
            Unit::Em => value * self.font_size_px,
            Unit::Ex | Unit::Ch => value * self.font_size_px * 0.5,
            Unit::Rem => value * self.root_font_size_px,
            Unit::Percent => value * self.reference_px / 100.0,
            Unit::Vw => value * self.viewport_width_px / 100.0,
            Unit::Vh => value * self.viewport_height_px / 100.0,
            Unit::Vmin => value * self.viewport_width_px.min(self.viewport_height_px) / 100.0,
            Unit::Vmax => value * self.viewport_width_px.max(self.viewport_height_px) / 100.0,
            Unit::Deg | Unit::Rad | Unit::Grad | Unit::Ms | Unit::S | Unit::Hz | Unit::Khz => {
                return None
            }
        };
        px.is_finite().then_some(px)
    }

    /// Pixel length rounded to the nearest integer.
    pub fn length_px(&self, value: f32, unit: Unit) -> Option<i32> {
        self.length_px_f32(value, unit).map(|px| px.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ResolveContext {
        ResolveContext {
            ppi: 144,
            font_size_px: 12.0,
            root_font_size_px: 16.0,
            reference_px: 100.0,
            viewport_width_px: 600.0,
            viewport_height_px: 800.0,
        }
    }

    #[test]
    fn em_resolves_against_font_size() {
        assert_eq!(Value::number(1.5, Unit::Em).to_px(&ctx()), Some(18));
    }

    #[test]
    fn percent_resolves_against_reference() {
        assert_eq!(Value::number(50.0, Unit::Percent).to_px(&ctx()), Some(50));
    }

    #[test]
    fn absolute_units_go_through_ppi() {
        let c = ctx();
        assert_eq!(c.length_px(72.0, Unit::Pt), Some(144));
        assert_eq!(c.length_px(1.0, Unit::In), Some(144));
        assert_eq!(c.length_px(2.54, Unit::Cm), Some(144));
        assert_eq!(c.length_px(25.4, Unit::Mm), Some(144));
        assert_eq!(c.length_px(1.0, Unit::Pc), Some(24));
        assert_eq!(c.length_px(7.0, Unit::Px), Some(7));
    }

    #[test]
    fn viewport_and_root_units() {
        let c = ctx();
        assert_eq!(c.length_px(10.0, Unit::Vw), Some(60));
        assert_eq!(c.length_px(10.0, Unit::Vh), Some(80));
        assert_eq!(c.length_px(10.0, Unit::Vmin), Some(60));
        assert_eq!(c.length_px(10.0, Unit::Vmax), Some(80));
        assert_eq!(c.length_px(2.0, Unit::Rem), Some(32));
        assert_eq!(c.length_px(2.0, Unit::Ch), Some(12));
    }

    #[test]
    fn non_lengths_do_not_resolve() {
        let c = ctx();
        assert_eq!(c.length_px(90.0, Unit::Deg), None);
        assert_eq!(Value::Ident("auto".into()).to_px(&c), None);
        assert!(!Unit::Ms.is_length());
    }

    #[test]
    fn unit_suffixes_are_case_insensitive() {
        assert_eq!(Unit::from_suffix("EM"), Some(Unit::Em));
        assert_eq!(Unit::from_suffix("kHz"), Some(Unit::Khz));
        assert_eq!(Unit::from_suffix("furlong"), None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let c = ctx();
        let first = c.length_px(1.37, Unit::Em);
        for _ in 0..8 {
            assert_eq!(c.length_px(1.37, Unit::Em), first);
        }
    }
}
