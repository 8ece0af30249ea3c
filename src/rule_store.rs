//! Append-only rule arena indexed by selector key.

use std::collections::BTreeMap;

use crate::css_parser::CssParser;
use crate::document::{ElementDescriptor, ElementPath};
use crate::properties::{PropertyId, PropertySuite};
use crate::selector::{Selector, Specificity, FONT_FACE_KEY};
use crate::values::{FontStyle, FontWeight, Value};

/// Handle to a selector in a [`RuleStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectorId(u32);

/// Handle to a declaration block in a [`RuleStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuiteId(u32);

/// Handle to a rule in a [`RuleStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

/// Registration sequence number; the final cascade tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceOrder(pub u32);

/// Where a rule came from. Later origins outrank earlier ones regardless of
/// specificity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    UserAgent,
    #[default]
    Author,
    Inline,
}

/// One selector bound to one declaration block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub selector: SelectorId,
    pub suite: SuiteId,
    pub order: SourceOrder,
    pub origin: Origin,
}

/// A rule that matched an element, with everything needed to sort it.
#[derive(Clone, Copy, Debug)]
pub struct MatchedRule<'a> {
    pub rule: RuleId,
    pub origin: Origin,
    pub specificity: Specificity,
    pub order: SourceOrder,
    pub suite: &'a PropertySuite,
}

impl MatchedRule<'_> {
    /// Cascade ordering key: origin, then specificity, then source order.
    pub fn cascade_key(&self) -> (Origin, Specificity, SourceOrder) {
        (self.origin, self.specificity, self.order)
    }
}

/// Family and sources declared by one `@font-face` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFaceSource {
    pub family: String,
    /// `url(...)` sources in declaration order.
    pub urls: Vec<String>,
    pub weight: FontWeight,
    pub style: FontStyle,
}

/// Built-in defaults applied below every author sheet.
pub const USER_AGENT_CSS: &str = "
html, body, div, p, blockquote, section, article, aside, header, footer, nav,
figure, figcaption, h1, h2, h3, h4, h5, h6, ul, ol, dl, dt, dd, pre, hr, table,
tr, td, th, caption, address, center { display: block; }
li { display: list-item; }
head, script, style, title { display: none; }
p { margin-top: 0.5em; margin-bottom: 0.5em; }
h1 { font-size: 2em; font-weight: bold; margin-top: 0.67em; margin-bottom: 0.67em; }
h2 { font-size: 1.5em; font-weight: bold; margin-top: 0.83em; margin-bottom: 0.83em; }
h3 { font-size: 1.17em; font-weight: bold; margin-top: 1em; margin-bottom: 1em; }
h4 { font-weight: bold; margin-top: 1.33em; margin-bottom: 1.33em; }
h5 { font-size: 0.83em; font-weight: bold; }
h6 { font-size: 0.67em; font-weight: bold; }
b, strong, th { font-weight: bold; }
i, em, cite, var, dfn { font-style: italic; }
blockquote { margin-left: 2em; margin-right: 2em; }
ul, ol, dd { margin-left: 2em; }
pre, code, kbd, samp, tt { font-family: monospace; }
sub { vertical-align: sub; font-size: smaller; }
sup { vertical-align: super; font-size: smaller; }
center { text-align: center; }
";

/// Arena of selectors and declaration blocks for one document session.
///
/// Entries are only ever appended; registering a rule under a key that is
/// already present adds to that key's list.
#[derive(Clone, Debug, Default)]
pub struct RuleStore {
    selectors: Vec<Selector>,
    suites: Vec<PropertySuite>,
    rules: Vec<Rule>,
    index: BTreeMap<String, Vec<RuleId>>,
    next_order: u32,
}

/// Arena index as a handle; saturates past `u32::MAX` entries.
fn handle(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with [`USER_AGENT_CSS`].
    pub fn user_agent() -> Self {
        let mut store = Self::new();
        CssParser::new().parse_with_origin(&mut store, USER_AGENT_CSS, Origin::UserAgent);
        store
    }

    pub fn add_suite(&mut self, suite: PropertySuite) -> SuiteId {
        let id = SuiteId(handle(self.suites.len()));
        self.suites.push(suite);
        id
    }

    /// Register `selector` against an existing suite, assigning the next
    /// source order.
    pub fn register(&mut self, selector: Selector, suite: SuiteId, origin: Origin) -> RuleId {
        let key = selector.key();
        let selector_id = SelectorId(handle(self.selectors.len()));
        self.selectors.push(selector);
        let rule_id = RuleId(handle(self.rules.len()));
        self.rules.push(Rule {
            selector: selector_id,
            suite,
            order: SourceOrder(self.next_order),
            origin,
        });
        self.next_order = self.next_order.saturating_add(1);
        self.index.entry(key).or_default().push(rule_id);
        rule_id
    }

    /// Move every rule of `other` after this store's rules.
    pub fn append(&mut self, other: RuleStore) {
        let suite_base = handle(self.suites.len());
        self.suites.extend(other.suites);
        let mut rules: Vec<(Selector, Rule)> = other
            .rules
            .iter()
            .filter_map(|rule| Some((other.selectors.get(rule.selector.0 as usize)?.clone(), *rule)))
            .collect();
        rules.sort_by_key(|(_, rule)| rule.order);
        for (selector, rule) in rules {
            self.register(selector, SuiteId(suite_base.saturating_add(rule.suite.0)), rule.origin);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0 as usize)
    }

    pub fn selector(&self, id: SelectorId) -> Option<&Selector> {
        self.selectors.get(id.0 as usize)
    }

    pub fn suite(&self, id: SuiteId) -> Option<&PropertySuite> {
        self.suites.get(id.0 as usize)
    }

    /// Rules filed under an exact key, in registration order.
    pub fn rules_for_key(&self, key: &str) -> &[RuleId] {
        self.index.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate `(selector, suite, rule)` for every rule in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Selector, &PropertySuite, &Rule)> {
        self.rules.iter().filter_map(|rule| {
            Some((self.selector(rule.selector)?, self.suite(rule.suite)?, rule))
        })
    }

    /// Merged declarations of every subject-only rule for `tag` (and
    /// optionally `class`).
    ///
    /// Keys are probed as `tag.class`, `tag`, `.class`, `*`; all hits are
    /// merged in cascade order so the last declaration of each property in
    /// the result is the winning one.
    pub fn search(&self, tag: &str, class: Option<&str>) -> Option<PropertySuite> {
        let tag = tag.to_ascii_lowercase();
        let mut element = ElementDescriptor::new(tag.as_str());
        element.first_child = false;
        let mut keys: Vec<String> = Vec::with_capacity(4);
        if let Some(class) = class {
            element = element.with_classes(class);
            keys.push(format!("{}.{}", tag, class));
        }
        keys.push(tag.clone());
        if let Some(class) = class {
            keys.push(format!(".{}", class));
        }
        keys.push("*".to_string());

        let mut matched = Vec::with_capacity(8);
        for key in &keys {
            for &rule_id in self.rules_for_key(key) {
                if let Some(m) = self.match_rule(rule_id, |sel| sel.matches_element(&element)) {
                    matched.push(m);
                }
            }
        }
        if matched.is_empty() {
            return None;
        }
        Some(merge_in_cascade_order(&mut matched))
    }

    /// Every rule matching the subject of `path`, sorted in cascade order.
    pub fn matching_rules(&self, path: &ElementPath<'_>) -> Vec<MatchedRule<'_>> {
        let Some(element) = path.subject() else {
            return Vec::new();
        };
        let mut rule_ids: Vec<RuleId> = Vec::with_capacity(16);
        let mut push_key = |key: &str| rule_ids.extend_from_slice(self.rules_for_key(key));
        if let Some(id) = &element.id {
            push_key(&format!("{}#{}", element.tag, id));
            push_key(&format!("#{}", id));
        }
        for class in &element.classes {
            push_key(&format!("{}.{}", element.tag, class));
            push_key(&format!(".{}", class));
        }
        push_key(&element.tag);
        push_key("*");
        rule_ids.sort_unstable();
        rule_ids.dedup();

        let mut matched: Vec<MatchedRule<'_>> = rule_ids
            .into_iter()
            .filter_map(|id| self.match_rule(id, |sel| sel.matches(path)))
            .collect();
        matched.sort_by_key(MatchedRule::cascade_key);
        matched
    }

    fn match_rule<F>(&self, id: RuleId, pred: F) -> Option<MatchedRule<'_>>
    where
        F: Fn(&Selector) -> bool,
    {
        let rule = self.rule(id)?;
        let selector = self.selector(rule.selector)?;
        if !pred(selector) {
            return None;
        }
        Some(MatchedRule {
            rule: id,
            origin: rule.origin,
            specificity: selector.specificity(),
            order: rule.order,
            suite: self.suite(rule.suite)?,
        })
    }

    /// Declaration blocks of every `@font-face` rule.
    pub fn font_faces(&self) -> impl Iterator<Item = &PropertySuite> {
        self.rules_for_key(FONT_FACE_KEY)
            .iter()
            .filter_map(|id| self.rule(*id))
            .filter_map(|rule| self.suite(rule.suite))
    }

    /// Family/source pairs declared by `@font-face` rules.
    ///
    /// Blocks without a family or without any `url(...)` are skipped.
    pub fn font_face_sources(&self) -> Vec<FontFaceSource> {
        let mut out = Vec::new();
        for suite in self.font_faces() {
            let family = match suite.get(PropertyId::FontFamily) {
                Some([Value::Str(family), ..]) => family.clone(),
                _ => continue,
            };
            let urls: Vec<String> = suite
                .get(PropertyId::Src)
                .unwrap_or(&[])
                .iter()
                .filter_map(|v| match v {
                    Value::Url(url) => Some(url.clone()),
                    _ => None,
                })
                .collect();
            if urls.is_empty() {
                continue;
            }
            let weight = match suite.get(PropertyId::FontWeight) {
                Some([Value::Weight(w)]) => *w,
                _ => FontWeight::Normal,
            };
            let style = match suite.get(PropertyId::FontStyle) {
                Some([Value::Style(s)]) => *s,
                _ => FontStyle::Normal,
            };
            out.push(FontFaceSource {
                family,
                urls,
                weight,
                style,
            });
        }
        out
    }
}

/// Flatten matched rules into one suite: normal declarations in cascade
/// order, then `!important` ones in the same order.
pub(crate) fn merge_in_cascade_order(matched: &mut [MatchedRule<'_>]) -> PropertySuite {
    matched.sort_by_key(MatchedRule::cascade_key);
    let mut merged = PropertySuite::new();
    for important in [false, true] {
        for m in matched.iter() {
            for prop in m.suite.properties.iter().filter(|p| p.important == important) {
                merged.push(prop.clone());
            }
        }
    }
    merged
}
