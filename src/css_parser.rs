//! Error-tolerant CSS parser building [`RuleStore`]s.
//!
//! The parser never gives up on malformed input: broken declarations, rules
//! and at-rules are skipped to the next safe point, recorded as
//! [`CssDiagnostic`]s and logged. Only exceeded [`StyleLimits`] are errors.

use crate::css_tokenizer::{AtKeyword, SpannedToken, Token, Tokenizer};
use crate::error::{CssDiagnostic, StyleError};
use crate::properties::{post_process, Property, PropertyId, PropertySuite};
use crate::rule_store::{Origin, RuleStore};
use crate::selector::{Combinator, Qualifier, Selector, SelectorNode};
use crate::values::{Unit, Value};

/// Hard limits for stylesheet parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleLimits {
    /// Maximum number of rules a store may hold.
    pub max_selectors: usize,
    /// Maximum bytes for any individual stylesheet.
    pub max_css_bytes: usize,
    /// Maximum bytes for a single inline `style="..."` attribute.
    pub max_inline_style_bytes: usize,
    /// Maximum element depth that gets its own style; deeper elements
    /// inherit the format at the limit.
    pub max_nesting: usize,
}

impl Default for StyleLimits {
    fn default() -> Self {
        Self {
            max_selectors: 4096,
            max_css_bytes: 512 * 1024,
            max_inline_style_bytes: 16 * 1024,
            max_nesting: 256,
        }
    }
}

/// Stylesheet and inline-style parser.
#[derive(Clone, Debug, Default)]
pub struct CssParser {
    limits: StyleLimits,
    diagnostics: Vec<CssDiagnostic>,
}

impl CssParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: StyleLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Diagnostics recorded since construction or the last take.
    pub fn diagnostics(&self) -> &[CssDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<CssDiagnostic> {
        core::mem::take(&mut self.diagnostics)
    }

    /// Parse a stylesheet into a fresh store.
    ///
    /// Limit breaches are logged and leave whatever was registered before
    /// the breach.
    pub fn parse(&mut self, css: &str) -> RuleStore {
        let mut store = RuleStore::new();
        if let Err(err) = self.parse_into(&mut store, css, "<stylesheet>") {
            log::warn!("{}", err);
        }
        store
    }

    /// Parse another stylesheet, appending its rules after `store`'s.
    pub fn parse_into(
        &mut self,
        store: &mut RuleStore,
        css: &str,
        source: &str,
    ) -> Result<(), StyleError> {
        if css.len() > self.limits.max_css_bytes {
            return Err(StyleError::new(
                "STYLE_CSS_TOO_LARGE",
                format!(
                    "Stylesheet exceeds max_css_bytes ({} > {})",
                    css.len(),
                    self.limits.max_css_bytes
                ),
            )
            .with_limit("max_css_bytes", css.len(), self.limits.max_css_bytes)
            .with_path(source)
            .with_source(source));
        }
        self.parse_stylesheet(store, css, Origin::Author)
            .map_err(|err| err.with_path(source))
    }

    pub(crate) fn parse_with_origin(&mut self, store: &mut RuleStore, css: &str, origin: Origin) {
        if let Err(err) = self.parse_stylesheet(store, css, origin) {
            log::warn!("{}", err);
        }
    }

    /// Parse an inline `style=` attribute into a single-rule store.
    ///
    /// The rule carries [`Origin::Inline`], so it outranks every stylesheet
    /// rule when the store is handed to the cascade.
    pub fn parse_inline(&mut self, tag: &str, style: &str) -> RuleStore {
        let mut store = RuleStore::new();
        let suite = if style.len() > self.limits.max_inline_style_bytes {
            self.report(
                0,
                "CSS_INLINE_TOO_LARGE",
                format!(
                    "inline style on <{}> exceeds {} bytes",
                    tag, self.limits.max_inline_style_bytes
                ),
            );
            PropertySuite::new()
        } else {
            self.parse_declarations(style)
        };
        let suite_id = store.add_suite(suite);
        store.register(Selector::for_tag(tag), suite_id, Origin::Inline);
        store
    }

    /// Parse a bare declaration list such as an inline style.
    pub fn parse_declarations(&mut self, text: &str) -> PropertySuite {
        let mut stream = TokenStream::new(text);
        self.declaration_block(&mut stream, true)
    }

    fn parse_stylesheet(
        &mut self,
        store: &mut RuleStore,
        css: &str,
        origin: Origin,
    ) -> Result<(), StyleError> {
        let mut stream = TokenStream::new(css);
        loop {
            let tok = stream.peek();
            match tok.token {
                Token::Eof => return Ok(()),
                Token::Whitespace | Token::Cdo | Token::Cdc | Token::Semicolon => {
                    stream.next();
                }
                Token::AtKeyword(_) => {
                    let at = stream.next();
                    if let Token::AtKeyword(kw) = at.token {
                        self.at_rule(store, &mut stream, kw, at.offset, origin)?;
                    }
                }
                Token::RightBrace => {
                    stream.next();
                    self.report(tok.offset, "CSS_STRAY_BRACE", "unmatched '}'");
                }
                _ => self.ruleset(store, &mut stream, origin)?,
            }
        }
    }

    fn at_rule(
        &mut self,
        store: &mut RuleStore,
        stream: &mut TokenStream<'_>,
        kw: AtKeyword,
        offset: usize,
        origin: Origin,
    ) -> Result<(), StyleError> {
        match kw {
            AtKeyword::FontFace => {
                stream.skip_whitespace();
                if stream.peek().token != Token::LeftBrace {
                    self.report(offset, "CSS_BAD_AT_RULE", "@font-face without a block");
                    stream.skip_at_rule();
                    return Ok(());
                }
                stream.next();
                let suite = self.declaration_block(stream, false);
                if !suite.is_empty() {
                    self.check_selector_limit(store, "@font-face", offset)?;
                    let suite_id = store.add_suite(suite);
                    store.register(Selector::font_face(), suite_id, origin);
                }
            }
            AtKeyword::Import | AtKeyword::Charset => {
                log::debug!("ignoring @{:?} at byte {}", kw, offset);
                stream.skip_at_rule();
            }
            AtKeyword::Media | AtKeyword::Page | AtKeyword::Namespace | AtKeyword::Other(_) => {
                log::debug!("skipping @{:?} block at byte {}", kw, offset);
                stream.skip_at_rule();
            }
        }
        Ok(())
    }

    fn ruleset(
        &mut self,
        store: &mut RuleStore,
        stream: &mut TokenStream<'_>,
        origin: Origin,
    ) -> Result<(), StyleError> {
        let start = stream.peek().offset;
        let mut prelude: Vec<SpannedToken> = Vec::with_capacity(8);
        let mut depth = 0usize;
        loop {
            let tok = stream.peek();
            match tok.token {
                Token::Eof => {
                    self.report(start, "CSS_UNTERMINATED_RULE", "selector without a block");
                    return Ok(());
                }
                Token::LeftBrace if depth == 0 => {
                    stream.next();
                    break;
                }
                Token::LeftParen | Token::LeftBracket | Token::Function(_) => depth += 1,
                Token::RightParen | Token::RightBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            prelude.push(stream.next());
        }

        let selectors = match parse_selector_list(&prelude) {
            Ok(selectors) => selectors,
            Err(reason) => {
                let end = stream.peek().offset;
                let text = stream.source_slice(start, end);
                self.report(
                    start,
                    "CSS_BAD_SELECTOR",
                    format!("{} in '{}'", reason, text.trim_end_matches('{').trim()),
                );
                stream.skip_block();
                return Ok(());
            }
        };
        let suite = self.declaration_block(stream, false);
        if suite.is_empty() {
            return Ok(());
        }
        let suite_id = store.add_suite(suite);
        for selector in selectors {
            self.check_selector_limit(store, &selector.to_string(), start)?;
            store.register(selector, suite_id, origin);
        }
        Ok(())
    }

    fn check_selector_limit(
        &self,
        store: &RuleStore,
        selector: &str,
        offset: usize,
    ) -> Result<(), StyleError> {
        if store.len() >= self.limits.max_selectors {
            return Err(StyleError::new(
                "STYLE_SELECTOR_LIMIT",
                format!(
                    "Stylesheet exceeds max_selectors ({} >= {})",
                    store.len() + 1,
                    self.limits.max_selectors
                ),
            )
            .with_limit("max_selectors", store.len() + 1, self.limits.max_selectors)
            .with_selector(selector)
            .with_token_offset(offset));
        }
        Ok(())
    }

    /// Parse declarations up to the closing `}` (consumed) or end of input.
    fn declaration_block(&mut self, stream: &mut TokenStream<'_>, inline: bool) -> PropertySuite {
        let mut suite = PropertySuite::new();
        loop {
            let tok = stream.peek();
            match tok.token {
                Token::Eof => {
                    if !inline {
                        self.report(tok.offset, "CSS_UNTERMINATED_BLOCK", "block not closed");
                    }
                    return suite;
                }
                Token::Whitespace | Token::Semicolon => {
                    stream.next();
                }
                Token::RightBrace => {
                    stream.next();
                    if !inline {
                        return suite;
                    }
                    self.report(tok.offset, "CSS_STRAY_BRACE", "unmatched '}' in inline style");
                }
                Token::Ident(_) => {
                    let name_tok = stream.next();
                    let Token::Ident(name) = name_tok.token else {
                        continue;
                    };
                    stream.skip_whitespace();
                    if stream.peek().token != Token::Colon {
                        self.report(
                            name_tok.offset,
                            "CSS_BAD_DECLARATION",
                            format!("expected ':' after '{}'", name),
                        );
                        stream.skip_declaration();
                        continue;
                    }
                    stream.next();
                    let value_tokens = stream.declaration_value();
                    if let Some(property) = self.declaration(&name, &value_tokens, name_tok.offset) {
                        suite.push(property);
                    }
                }
                _ => {
                    self.report(tok.offset, "CSS_BAD_DECLARATION", "expected a property name");
                    stream.skip_declaration();
                }
            }
        }
    }

    fn declaration(&mut self, name: &str, tokens: &[SpannedToken], offset: usize) -> Option<Property> {
        let (tokens, important) = strip_important(tokens);
        let mut idx = 0;
        let terms = match parse_terms(tokens, &mut idx, false) {
            Ok(terms) => terms,
            Err(reason) => {
                self.report(offset, "CSS_BAD_VALUE", format!("{}: {}", name, reason));
                return None;
            }
        };
        let Some(id) = PropertyId::from_name(name) else {
            log::debug!("ignoring unsupported property '{}' at byte {}", name, offset);
            return None;
        };
        match post_process(id, terms) {
            Ok(values) => Some(Property {
                id,
                values,
                important,
            }),
            Err(rejected) => {
                self.report(offset, rejected.code, rejected.message);
                None
            }
        }
    }

    fn report(&mut self, offset: usize, code: &'static str, message: impl Into<String>) {
        let diagnostic = CssDiagnostic::new(offset, code, message);
        log::warn!("css: {}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Token cursor with one token of lookahead.
struct TokenStream<'a> {
    tokenizer: Tokenizer<'a>,
    peeked: Option<SpannedToken>,
}

impl<'a> TokenStream<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(src),
            peeked: None,
        }
    }

    fn peek(&mut self) -> SpannedToken {
        if self.peeked.is_none() {
            self.peeked = Some(self.tokenizer.next_token());
        }
        self.peeked.clone().unwrap_or(SpannedToken {
            token: Token::Eof,
            offset: self.tokenizer.position(),
        })
    }

    fn next(&mut self) -> SpannedToken {
        match self.peeked.take() {
            Some(tok) => tok,
            None => self.tokenizer.next_token(),
        }
    }

    fn source_slice(&self, start: usize, end: usize) -> &'a str {
        self.tokenizer.slice(start, end)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().token == Token::Whitespace {
            self.next();
        }
    }

    /// Skip an at-rule: up to `;` at depth 0 or through one `{...}` block.
    fn skip_at_rule(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.next().token {
                Token::Eof => return,
                Token::Semicolon if depth == 0 => return,
                Token::LeftBrace => {
                    self.skip_block();
                    if depth == 0 {
                        return;
                    }
                }
                Token::RightBrace if depth == 0 => return,
                Token::LeftParen | Token::LeftBracket | Token::Function(_) => depth += 1,
                Token::RightParen | Token::RightBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }

    /// Skip to the `}` closing a block whose `{` was already consumed.
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        loop {
            match self.next().token {
                Token::Eof => return,
                Token::LeftBrace => depth += 1,
                Token::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip a declaration up to `;` (consumed) or a closing `}` (left).
    fn skip_declaration(&mut self) {
        self.declaration_value();
    }

    /// Collect value tokens up to `;` (consumed) or `}` (left), honoring
    /// nested brackets.
    fn declaration_value(&mut self) -> Vec<SpannedToken> {
        let mut out = Vec::with_capacity(8);
        let mut depth = 0usize;
        loop {
            let tok = self.peek();
            match tok.token {
                Token::Eof => return out,
                Token::Semicolon if depth == 0 => {
                    self.next();
                    return out;
                }
                Token::RightBrace if depth == 0 => return out,
                Token::LeftParen | Token::LeftBracket | Token::LeftBrace | Token::Function(_) => {
                    depth += 1
                }
                Token::RightParen | Token::RightBracket | Token::RightBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            out.push(self.next());
        }
    }
}

/// Split a trailing `! important` off a declaration value.
fn strip_important(tokens: &[SpannedToken]) -> (&[SpannedToken], bool) {
    let tokens = trim_whitespace(tokens);
    if let [rest @ .., last] = tokens {
        if matches!(&last.token, Token::Ident(i) if i.eq_ignore_ascii_case("important")) {
            if let [value @ .., bang] = trim_whitespace(rest) {
                if bang.token == Token::Delim('!') {
                    return (trim_whitespace(value), true);
                }
            }
        }
    }
    (tokens, false)
}

fn trim_whitespace(tokens: &[SpannedToken]) -> &[SpannedToken] {
    let start = tokens
        .iter()
        .position(|t| t.token != Token::Whitespace)
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| t.token != Token::Whitespace)
        .map_or(start, |i| i + 1);
    &tokens[start..end.max(start)]
}

/// Coerce value tokens into typed terms. Commas are kept as `Ident(",")`
/// separators; `/` separators are dropped.
fn parse_terms(tokens: &[SpannedToken], idx: &mut usize, in_function: bool) -> Result<Vec<Value>, String> {
    let mut out = Vec::with_capacity(4);
    while *idx < tokens.len() {
        let tok = &tokens[*idx];
        *idx += 1;
        let value = match &tok.token {
            Token::Whitespace | Token::Delim('/') => continue,
            Token::RightParen if in_function => return Ok(out),
            Token::Number(v) => Value::number(*v, Unit::None),
            Token::Percentage(v) => Value::number(*v, Unit::Percent),
            Token::Length { value, unit } => Value::number(*value, *unit),
            Token::Ident(s) => Value::Ident(s.clone()),
            Token::Str(s) => Value::Str(s.clone()),
            Token::Url(s) => Value::Url(s.clone()),
            Token::Hash(h) => Value::Ident(format!("#{}", h)),
            Token::Comma => Value::Ident(",".to_string()),
            Token::Function(name) => {
                let args = parse_terms(tokens, idx, true)?;
                let args = args.into_iter().filter(|a| a.as_ident() != Some(",")).collect();
                Value::Function {
                    name: name.to_ascii_lowercase(),
                    args,
                }
            }
            Token::Dimension { unit, .. } => return Err(format!("unknown unit '{}'", unit)),
            Token::BadString => return Err("malformed string".to_string()),
            Token::BadUrl => return Err("malformed url".to_string()),
            other => return Err(format!("unexpected {:?}", other)),
        };
        out.push(value);
    }
    if in_function {
        return Err("unclosed function".to_string());
    }
    Ok(out)
}

/// Parse a comma separated selector list; any bad selector rejects the list.
fn parse_selector_list(tokens: &[SpannedToken]) -> Result<Vec<Selector>, String> {
    let mut selectors = Vec::with_capacity(2);
    for part in tokens.split(|t| t.token == Token::Comma) {
        let part = trim_whitespace(part);
        if part.is_empty() {
            return Err("empty selector".to_string());
        }
        selectors.push(parse_selector(part)?);
    }
    Ok(selectors)
}

#[derive(Default)]
struct SelectorBuilder {
    nodes: Vec<SelectorNode>,
    current: Option<SelectorNode>,
    pending: Option<Combinator>,
    saw_space: bool,
}

impl SelectorBuilder {
    /// Node the next simple selector attaches to, opening a new compound
    /// after whitespace or an explicit combinator.
    fn node(&mut self) -> &mut SelectorNode {
        if self.current.is_some() && (self.saw_space || self.pending.is_some()) {
            self.finish();
        }
        if self.current.is_none() {
            let combinator = if self.nodes.is_empty() {
                Combinator::None
            } else {
                self.pending.take().unwrap_or(Combinator::Descendant)
            };
            self.saw_space = false;
            self.current = Some(SelectorNode {
                combinator,
                ..SelectorNode::default()
            });
        }
        self.current.get_or_insert_with(SelectorNode::default)
    }

    fn finish(&mut self) {
        if let Some(node) = self.current.take() {
            self.nodes.push(node);
        }
        self.saw_space = false;
    }

    fn combinator(&mut self, combinator: Combinator) -> Result<(), String> {
        if self.current.is_none() || self.pending.is_some() {
            return Err("dangling combinator".to_string());
        }
        self.finish();
        self.pending = Some(combinator);
        Ok(())
    }

    fn can_take_tag(&self) -> bool {
        self.current.is_none() || self.saw_space || self.pending.is_some()
    }
}

fn parse_selector(tokens: &[SpannedToken]) -> Result<Selector, String> {
    let mut b = SelectorBuilder::default();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i].token {
            Token::Whitespace => {
                if b.current.is_some() {
                    b.saw_space = true;
                }
            }
            Token::Greater => b.combinator(Combinator::Child)?,
            Token::Plus => b.combinator(Combinator::Adjacent)?,
            Token::Tilde => return Err("general sibling combinator unsupported".to_string()),
            Token::Ident(name) => {
                if !b.can_take_tag() {
                    return Err(format!("unexpected '{}'", name));
                }
                b.node().tag = Some(name.to_ascii_lowercase());
            }
            Token::Delim('*') => {
                if !b.can_take_tag() {
                    return Err("unexpected '*'".to_string());
                }
                b.node();
            }
            Token::Hash(id) => {
                let id = id.clone();
                b.node().ids.push(id);
            }
            Token::Delim('.') => {
                let Some(Token::Ident(class)) = tokens.get(i + 1).map(|t| &t.token) else {
                    return Err("expected class name after '.'".to_string());
                };
                let class = class.clone();
                let node = b.node();
                if !node.classes.contains(&class) {
                    node.classes.push(class);
                }
                i += 1;
            }
            Token::Colon => {
                let element_syntax = tokens.get(i + 1).map(|t| &t.token) == Some(&Token::Colon);
                if element_syntax {
                    i += 1;
                }
                let qualifier = match tokens.get(i + 1).map(|t| &t.token) {
                    Some(Token::Ident(name)) => Qualifier::from_name(name, element_syntax)
                        .ok_or_else(|| format!("unsupported pseudo ':{}'", name))?,
                    Some(Token::Function(name)) => {
                        return Err(format!("unsupported pseudo function ':{}()'", name))
                    }
                    _ => return Err("expected pseudo name after ':'".to_string()),
                };
                let node = b.node();
                if node.pseudo.is_some() {
                    return Err("more than one pseudo qualifier".to_string());
                }
                node.pseudo = Some(qualifier);
                i += 1;
            }
            Token::LeftBracket => return Err("attribute selectors unsupported".to_string()),
            other => return Err(format!("unexpected {:?}", other)),
        }
        i += 1;
    }
    if b.pending.is_some() {
        return Err("dangling combinator".to_string());
    }
    b.finish();
    if b.nodes.is_empty() {
        return Err("empty selector".to_string());
    }
    Ok(Selector::new(b.nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::get_values_from_suite;
    use crate::selector::Specificity;
    use crate::values::{Align, FontWeight};

    fn parse(css: &str) -> (RuleStore, Vec<CssDiagnostic>) {
        let mut parser = CssParser::new();
        let store = parser.parse(css);
        (store, parser.take_diagnostics())
    }

    fn selectors(store: &RuleStore) -> Vec<String> {
        store.iter().map(|(sel, _, _)| sel.to_string()).collect()
    }

    #[test]
    fn parses_rules_and_selector_lists() {
        let (store, diags) = parse("h1, h2.title { font-weight: bold } p { text-align: justify; }");
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(selectors(&store), vec!["h1", "h2.title", "p"]);
        assert_eq!(store.rules_for_key("h2.title").len(), 1);
    }

    #[test]
    fn combinators_build_multi_node_selectors() {
        let (store, _) = parse("div > p + span em, .a .b { margin: 0 }");
        assert_eq!(selectors(&store), vec!["div > p + span em", ".a .b"]);
        let specs: Vec<Specificity> = store.iter().map(|(s, _, _)| s.specificity()).collect();
        assert_eq!(specs, vec![Specificity::new(0, 0, 4), Specificity::new(0, 2, 0)]);
    }

    #[test]
    fn unsupported_selector_discards_only_that_rule() {
        let (store, diags) =
            parse("a[href] { margin: 0 } p:not(.x) { margin: 0 } h1 ~ p { margin: 0 } p { margin: 1px }");
        assert_eq!(selectors(&store), vec!["p"]);
        assert_eq!(diags.len(), 3);
        assert!(diags.iter().all(|d| d.code == "CSS_BAD_SELECTOR"));
        assert!(diags[0].message.contains("a[href]"));
        assert!(diags[2].message.contains("h1 ~ p"));
    }

    #[test]
    fn malformed_declaration_skips_to_semicolon() {
        let (store, diags) = parse("p { margin-top 4px; text-align: center; font-size: 'x; line-height: 1.5 }");
        let suite = store.iter().next().map(|(_, s, _)| s.clone()).unwrap_or_default();
        assert_eq!(
            get_values_from_suite(&suite, PropertyId::TextAlign),
            Some(&[Value::Align(Align::Center)][..])
        );
        assert!(suite.get(PropertyId::MarginTop).is_none());
        assert!(!diags.is_empty());
    }

    #[test]
    fn unknown_keyword_dropped_block_continues() {
        let (store, diags) = parse("p { text-align: sideways; font-weight: bold }");
        let suite = store.iter().next().map(|(_, s, _)| s.clone()).unwrap_or_default();
        assert_eq!(suite.len(), 1);
        assert_eq!(
            suite.get(PropertyId::FontWeight),
            Some(&[Value::Weight(FontWeight::Bold)][..])
        );
        assert_eq!(diags[0].code, "CSS_UNKNOWN_KEYWORD");
    }

    #[test]
    fn unknown_properties_are_silently_ignored() {
        let (store, diags) = parse("p { color: red; -webkit-hyphens: auto; margin-left: 2em }");
        let suite = store.iter().next().map(|(_, s, _)| s.clone()).unwrap_or_default();
        assert_eq!(suite.len(), 1);
        assert!(diags.is_empty());
    }

    #[test]
    fn at_rules_are_skipped_or_attached() {
        let css = "@charset \"utf-8\";
            @import url(other.css);
            @namespace epub \"http://www.idpf.org/2007/ops\";
            @media print { p { margin: 0 } @page { size: a4 } }
            @page :first { margin: 0 }
            @font-face { font-family: Body; src: url(body.ttf) }
            p { text-indent: 1em }";
        let (store, diags) = parse(css);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(selectors(&store), vec!["@font-face", "p"]);
        assert_eq!(store.font_faces().count(), 1);
    }

    #[test]
    fn parser_always_reaches_end_of_buffer() {
        let (store, _) = parse("} p { margin: ; } {{ broken ]] h1 { font-weight: bold } h2 { text-align");
        assert!(store.rules_for_key("h1").len() <= 1);
        let (store, _) = parse("\"unterminated\n p { margin: 0 } h3 { font-weight: bold }");
        assert_eq!(store.rules_for_key("h3").len(), 1);
    }

    #[test]
    fn important_flag_is_recorded() {
        let (store, _) = parse("p { text-align: center ! important; margin-top: 0 !important }");
        let suite = store.iter().next().map(|(_, s, _)| s.clone()).unwrap_or_default();
        assert!(suite.properties.iter().all(|p| p.important));
    }

    #[test]
    fn functions_and_urls_in_src() {
        let (store, _) =
            parse("@font-face { font-family: 'X'; src: url('x.woff') format('woff'), local(X) }");
        let suite = store.font_faces().next().cloned().unwrap_or_default();
        let src = suite.get(PropertyId::Src).unwrap_or(&[]);
        assert_eq!(src[0], Value::Url("x.woff".into()));
        assert_eq!(
            src[1],
            Value::Function {
                name: "format".into(),
                args: vec![Value::Str("woff".into())]
            }
        );
    }

    #[test]
    fn inline_style_gets_inline_origin() {
        let mut parser = CssParser::new();
        let store = parser.parse_inline("P", "text-align: right; margin-left: 3px");
        let rules: Vec<_> = store.iter().collect();
        assert_eq!(rules.len(), 1);
        let (sel, suite, rule) = rules[0];
        assert_eq!(sel.to_string(), "p");
        assert_eq!(rule.origin, Origin::Inline);
        assert_eq!(suite.len(), 2);
    }

    #[test]
    fn limits_are_enforced() {
        let mut parser = CssParser::new().with_limits(StyleLimits {
            max_selectors: 2,
            max_css_bytes: 64,
            max_inline_style_bytes: 8,
            ..StyleLimits::default()
        });
        let mut store = RuleStore::new();
        let err = parser
            .parse_into(&mut store, "a { margin: 0 } b { margin: 0 } i { margin: 0 }", "s.css")
            .err()
            .map(|e| e.code);
        assert_eq!(err, Some("STYLE_SELECTOR_LIMIT"));
        assert_eq!(store.len(), 2);
        let big = "p { margin: 0 }".repeat(10);
        let err = parser.parse_into(&mut RuleStore::new(), &big, "big.css").err();
        assert_eq!(err.map(|e| e.code), Some("STYLE_CSS_TOO_LARGE"));
        let inline = parser.parse_inline("p", "margin-left: 100px");
        assert!(inline.iter().all(|(_, suite, _)| suite.is_empty()));
    }
}
