//! Supported properties and keyword post-processing.

use crate::values::{
    Align, DisplayKind, FontStyle, FontWeight, TextTransform, Unit, Value, VerticalAlign,
};

/// The supported property subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyId {
    FontFamily,
    FontSize,
    FontStyle,
    FontWeight,
    TextAlign,
    TextIndent,
    TextTransform,
    LineHeight,
    Src,
    Margin,
    MarginTop,
    MarginBottom,
    MarginLeft,
    MarginRight,
    Width,
    Height,
    VerticalAlign,
    Display,
}

impl PropertyId {
    pub const COUNT: usize = 18;

    /// Look up a property by its CSS name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let id = match name.to_ascii_lowercase().as_str() {
            "font-family" => Self::FontFamily,
            "font-size" => Self::FontSize,
            "font-style" => Self::FontStyle,
            "font-weight" => Self::FontWeight,
            "text-align" => Self::TextAlign,
            "text-indent" => Self::TextIndent,
            "text-transform" => Self::TextTransform,
            "line-height" => Self::LineHeight,
            "src" => Self::Src,
            "margin" => Self::Margin,
            "margin-top" => Self::MarginTop,
            "margin-bottom" => Self::MarginBottom,
            "margin-left" => Self::MarginLeft,
            "margin-right" => Self::MarginRight,
            "width" => Self::Width,
            "height" => Self::Height,
            "vertical-align" => Self::VerticalAlign,
            "display" => Self::Display,
            _ => return None,
        };
        Some(id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FontFamily => "font-family",
            Self::FontSize => "font-size",
            Self::FontStyle => "font-style",
            Self::FontWeight => "font-weight",
            Self::TextAlign => "text-align",
            Self::TextIndent => "text-indent",
            Self::TextTransform => "text-transform",
            Self::LineHeight => "line-height",
            Self::Src => "src",
            Self::Margin => "margin",
            Self::MarginTop => "margin-top",
            Self::MarginBottom => "margin-bottom",
            Self::MarginLeft => "margin-left",
            Self::MarginRight => "margin-right",
            Self::Width => "width",
            Self::Height => "height",
            Self::VerticalAlign => "vertical-align",
            Self::Display => "display",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub id: PropertyId,
    pub values: Vec<Value>,
    pub important: bool,
}

impl Property {
    pub fn new(id: PropertyId, values: Vec<Value>) -> Self {
        Self {
            id,
            values,
            important: false,
        }
    }
}

/// One declaration block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertySuite {
    pub properties: Vec<Property>,
}

impl PropertySuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Values of the last declaration of `id` in this block.
    pub fn get(&self, id: PropertyId) -> Option<&[Value]> {
        get_values_from_props(&self.properties, id)
    }

    /// Append `other`'s declarations after this block's.
    pub fn merge(&mut self, other: &PropertySuite) {
        self.properties.extend(other.properties.iter().cloned());
    }
}

/// Values of the last declaration of `id` within a suite.
pub fn get_values_from_suite(suite: &PropertySuite, id: PropertyId) -> Option<&[Value]> {
    get_values_from_props(&suite.properties, id)
}

/// Values of the last declaration of `id` within a property list.
pub fn get_values_from_props(props: &[Property], id: PropertyId) -> Option<&[Value]> {
    props
        .iter()
        .rev()
        .find(|p| p.id == id)
        .map(|p| p.values.as_slice())
}

/// Named font sizes, in points.
pub const FONT_SIZE_KEYWORDS: [(&str, f32); 7] = [
    ("xx-small", 7.0),
    ("x-small", 7.5),
    ("small", 10.0),
    ("medium", 12.0),
    ("large", 13.5),
    ("x-large", 18.0),
    ("xx-large", 24.0),
];

/// Line-height factor used for `line-height: normal`.
pub const NORMAL_LINE_HEIGHT: f32 = 1.2;

/// Why a declaration was dropped during post-processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedDeclaration {
    pub code: &'static str,
    pub message: String,
}

impl RejectedDeclaration {
    fn keyword(id: PropertyId, keyword: &str) -> Self {
        Self {
            code: "CSS_UNKNOWN_KEYWORD",
            message: format!("unrecognized value '{}' for {}", keyword, id.name()),
        }
    }

    fn shape(id: PropertyId, detail: &str) -> Self {
        Self {
            code: "CSS_BAD_VALUE",
            message: format!("invalid value for {}: {}", id.name(), detail),
        }
    }
}

/// Turn raw terms into the typed values stored for `id`.
///
/// Keywords become enum choices; anything the property cannot take rejects
/// the whole declaration.
pub fn post_process(id: PropertyId, values: Vec<Value>) -> Result<Vec<Value>, RejectedDeclaration> {
    if values.is_empty() {
        return Err(RejectedDeclaration::shape(id, "empty"));
    }
    match id {
        PropertyId::TextAlign => single_keyword(id, &values, |kw| {
            let align = match kw {
                "left" | "start" => Align::Left,
                "right" | "end" => Align::Right,
                "center" => Align::Center,
                "justify" => Align::Justify,
                _ => return None,
            };
            Some(Value::Align(align))
        }),
        PropertyId::FontWeight => match values.as_slice() {
            [Value::Number {
                value,
                unit: Unit::None,
            }] => Ok(vec![Value::Weight(if *value >= 600.0 {
                FontWeight::Bold
            } else {
                FontWeight::Normal
            })]),
            _ => single_keyword(id, &values, |kw| {
                let weight = match kw {
                    "normal" | "lighter" => FontWeight::Normal,
                    "bold" | "bolder" => FontWeight::Bold,
                    _ => return None,
                };
                Some(Value::Weight(weight))
            }),
        },
        PropertyId::FontStyle => single_keyword(id, &values, |kw| {
            let style = match kw {
                "normal" => FontStyle::Normal,
                "italic" | "oblique" => FontStyle::Italic,
                _ => return None,
            };
            Some(Value::Style(style))
        }),
        PropertyId::TextTransform => single_keyword(id, &values, |kw| {
            let transform = match kw {
                "none" => TextTransform::None,
                "uppercase" => TextTransform::Uppercase,
                "lowercase" => TextTransform::Lowercase,
                "capitalize" => TextTransform::Capitalize,
                _ => return None,
            };
            Some(Value::Transform(transform))
        }),
        PropertyId::Display => single_keyword(id, &values, |kw| {
            let display = match kw {
                "none" => DisplayKind::None,
                "inline" => DisplayKind::Inline,
                "block" | "table" | "table-row" | "table-cell" | "table-caption" => {
                    DisplayKind::Block
                }
                "inline-block" => DisplayKind::InlineBlock,
                "list-item" => DisplayKind::ListItem,
                _ => return None,
            };
            Some(Value::Display(display))
        }),
        PropertyId::VerticalAlign => match values.as_slice() {
            [v @ Value::Number { unit, .. }] if unit.is_length() => Ok(vec![v.clone()]),
            _ => single_keyword(id, &values, |kw| {
                let mode = match kw {
                    "baseline" => VerticalAlign::Baseline,
                    "sub" => VerticalAlign::Sub,
                    "super" => VerticalAlign::Super,
                    "top" => VerticalAlign::Top,
                    "middle" => VerticalAlign::Middle,
                    "bottom" => VerticalAlign::Bottom,
                    "text-top" => VerticalAlign::TextTop,
                    "text-bottom" => VerticalAlign::TextBottom,
                    _ => return None,
                };
                Some(Value::VerticalAlign(mode))
            }),
        },
        PropertyId::FontSize => match values.as_slice() {
            [v @ Value::Number { unit, .. }] if unit.is_length() => Ok(vec![v.clone()]),
            _ => single_keyword(id, &values, |kw| match kw {
                "smaller" => Some(Value::number(0.8, Unit::Em)),
                "larger" => Some(Value::number(1.2, Unit::Em)),
                _ => FONT_SIZE_KEYWORDS
                    .iter()
                    .find(|(name, _)| *name == kw)
                    .map(|(_, pt)| Value::number(*pt, Unit::Pt)),
            }),
        },
        PropertyId::LineHeight => match values.as_slice() {
            [v @ Value::Number { unit, .. }] if unit.is_length() => Ok(vec![v.clone()]),
            _ => single_keyword(id, &values, |kw| {
                (kw == "normal").then(|| Value::number(NORMAL_LINE_HEIGHT, Unit::None))
            }),
        },
        PropertyId::TextIndent
        | PropertyId::MarginTop
        | PropertyId::MarginBottom
        | PropertyId::MarginLeft
        | PropertyId::MarginRight
        | PropertyId::Width
        | PropertyId::Height => {
            if values.len() != 1 {
                return Err(RejectedDeclaration::shape(id, "expected one value"));
            }
            length_or_auto(id, &values[0]).map(|v| vec![v])
        }
        PropertyId::Margin => {
            if values.len() > 4 {
                return Err(RejectedDeclaration::shape(id, "more than four values"));
            }
            values.iter().map(|v| length_or_auto(id, v)).collect()
        }
        PropertyId::FontFamily => font_family(values),
        PropertyId::Src => Ok(values),
    }
}

fn single_keyword<F>(id: PropertyId, values: &[Value], map: F) -> Result<Vec<Value>, RejectedDeclaration>
where
    F: Fn(&str) -> Option<Value>,
{
    match values {
        [Value::Ident(kw)] => map(&kw.to_ascii_lowercase())
            .map(|v| vec![v])
            .ok_or_else(|| RejectedDeclaration::keyword(id, kw)),
        [other] => Err(RejectedDeclaration::keyword(id, &other.to_string())),
        _ => Err(RejectedDeclaration::shape(id, "expected a single keyword")),
    }
}

fn length_or_auto(id: PropertyId, value: &Value) -> Result<Value, RejectedDeclaration> {
    match value {
        Value::Number { unit, .. } if unit.is_length() => Ok(value.clone()),
        Value::Ident(kw) if kw.eq_ignore_ascii_case("auto") => Ok(Value::Ident("auto".into())),
        other => Err(RejectedDeclaration::keyword(id, &other.to_string())),
    }
}

/// Join adjacent idents (`Times New Roman`) and split on commas.
///
/// Commas arrive as `Value::Ident(",")` separators from the parser.
fn font_family(values: Vec<Value>) -> Result<Vec<Value>, RejectedDeclaration> {
    let mut families = Vec::new();
    let mut current = String::new();
    for value in values {
        match value {
            Value::Ident(sep) if sep == "," => {
                if !current.is_empty() {
                    families.push(Value::Str(core::mem::take(&mut current)));
                }
            }
            Value::Ident(word) | Value::Str(word) => {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&word);
            }
            other => {
                return Err(RejectedDeclaration::keyword(
                    PropertyId::FontFamily,
                    &other.to_string(),
                ))
            }
        }
    }
    if !current.is_empty() {
        families.push(Value::Str(current));
    }
    if families.is_empty() {
        return Err(RejectedDeclaration::shape(PropertyId::FontFamily, "empty"));
    }
    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Value {
        Value::Ident(s.to_string())
    }

    #[test]
    fn keywords_become_enum_choices() {
        assert_eq!(
            post_process(PropertyId::TextAlign, vec![ident("justify")]),
            Ok(vec![Value::Align(Align::Justify)])
        );
        assert_eq!(
            post_process(PropertyId::FontWeight, vec![ident("bolder")]),
            Ok(vec![Value::Weight(FontWeight::Bold)])
        );
        assert_eq!(
            post_process(PropertyId::FontWeight, vec![Value::number(700.0, Unit::None)]),
            Ok(vec![Value::Weight(FontWeight::Bold)])
        );
        assert_eq!(
            post_process(PropertyId::Display, vec![ident("LIST-ITEM")]),
            Ok(vec![Value::Display(DisplayKind::ListItem)])
        );
    }

    #[test]
    fn named_font_sizes_use_point_table() {
        assert_eq!(
            post_process(PropertyId::FontSize, vec![ident("xx-large")]),
            Ok(vec![Value::number(24.0, Unit::Pt)])
        );
        assert_eq!(
            post_process(PropertyId::FontSize, vec![ident("xx-small")]),
            Ok(vec![Value::number(7.0, Unit::Pt)])
        );
        assert_eq!(
            post_process(PropertyId::FontSize, vec![ident("smaller")]),
            Ok(vec![Value::number(0.8, Unit::Em)])
        );
    }

    #[test]
    fn unknown_keyword_rejects_declaration() {
        let err = post_process(PropertyId::TextAlign, vec![ident("sideways")]);
        assert_eq!(err.map_err(|e| e.code), Err("CSS_UNKNOWN_KEYWORD"));
        assert!(post_process(PropertyId::Display, vec![ident("flex")]).is_err());
        assert!(post_process(PropertyId::MarginTop, vec![ident("wide")]).is_err());
    }

    #[test]
    fn margin_shorthand_accepts_up_to_four() {
        let four = vec![Value::number(1.0, Unit::Px); 4];
        assert!(post_process(PropertyId::Margin, four).is_ok());
        let five = vec![Value::number(1.0, Unit::Px); 5];
        assert!(post_process(PropertyId::Margin, five).is_err());
    }

    #[test]
    fn font_family_joins_words_and_splits_commas() {
        let values = vec![
            ident("Times"),
            ident("New"),
            ident("Roman"),
            ident(","),
            Value::Str("Georgia".into()),
            ident(","),
            ident("serif"),
        ];
        assert_eq!(
            post_process(PropertyId::FontFamily, values),
            Ok(vec![
                Value::Str("Times New Roman".into()),
                Value::Str("Georgia".into()),
                Value::Str("serif".into()),
            ])
        );
    }

    #[test]
    fn line_height_normal_maps_to_factor() {
        assert_eq!(
            post_process(PropertyId::LineHeight, vec![ident("normal")]),
            Ok(vec![Value::number(NORMAL_LINE_HEIGHT, Unit::None)])
        );
    }

    #[test]
    fn last_declaration_wins_within_block() {
        let props = vec![
            Property::new(PropertyId::FontSize, vec![Value::number(10.0, Unit::Px)]),
            Property::new(PropertyId::TextAlign, vec![Value::Align(Align::Center)]),
            Property::new(PropertyId::FontSize, vec![Value::number(14.0, Unit::Px)]),
        ];
        assert_eq!(
            get_values_from_props(&props, PropertyId::FontSize),
            Some(&[Value::number(14.0, Unit::Px)][..])
        );
        let suite = PropertySuite { properties: props };
        assert_eq!(get_values_from_suite(&suite, PropertyId::Width), None);
    }

    #[test]
    fn property_names_round_trip() {
        for name in ["font-size", "margin-left", "vertical-align", "src"] {
            assert_eq!(PropertyId::from_name(name).map(PropertyId::name), Some(name));
        }
        assert_eq!(PropertyId::from_name("color"), None);
        assert_eq!(PropertyId::Display.index() + 1, PropertyId::COUNT);
    }
}
