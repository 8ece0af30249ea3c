//! Selectors, specificity and element matching.

use core::fmt;

use smallvec::SmallVec;

use crate::document::{ElementDescriptor, ElementLevel, ElementPath};

/// Relation between a selector node and the node before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// First node of a selector.
    #[default]
    None,
    /// Whitespace.
    Descendant,
    /// `>`
    Child,
    /// `+`
    Adjacent,
}

/// Supported pseudo-class and pseudo-element qualifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    FirstChild,
    Link,
    Visited,
    Hover,
    Active,
    Focus,
    FirstLine,
    FirstLetter,
    Before,
    After,
}

impl Qualifier {
    /// Map a pseudo name (without colons) to a qualifier.
    ///
    /// `element_syntax` is true for the `::name` form, which only accepts
    /// pseudo-elements.
    pub fn from_name(name: &str, element_syntax: bool) -> Option<Self> {
        let q = match name.to_ascii_lowercase().as_str() {
            "first-line" => Self::FirstLine,
            "first-letter" => Self::FirstLetter,
            "before" => Self::Before,
            "after" => Self::After,
            _ if element_syntax => return None,
            "first-child" => Self::FirstChild,
            "link" => Self::Link,
            "visited" => Self::Visited,
            "hover" => Self::Hover,
            "active" => Self::Active,
            "focus" => Self::Focus,
            _ => return None,
        };
        Some(q)
    }

    fn name(self) -> &'static str {
        match self {
            Self::FirstChild => ":first-child",
            Self::Link => ":link",
            Self::Visited => ":visited",
            Self::Hover => ":hover",
            Self::Active => ":active",
            Self::Focus => ":focus",
            Self::FirstLine => "::first-line",
            Self::FirstLetter => "::first-letter",
            Self::Before => "::before",
            Self::After => "::after",
        }
    }

    /// Pages are static and there is no generated content, so only the
    /// structural qualifiers can ever match.
    fn matches(self, element: &ElementDescriptor) -> bool {
        match self {
            Self::FirstChild => element.first_child,
            Self::Link => element.tag == "a",
            _ => false,
        }
    }
}

/// One compound selector: tag or `*` plus qualifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorNode {
    /// `None` is the universal selector.
    pub tag: Option<String>,
    pub classes: SmallVec<[String; 2]>,
    pub ids: SmallVec<[String; 1]>,
    pub pseudo: Option<Qualifier>,
    pub combinator: Combinator,
}

impl SelectorNode {
    pub fn is_universal(&self) -> bool {
        self.tag.is_none() && self.classes.is_empty() && self.ids.is_empty() && self.pseudo.is_none()
    }

    fn matches_element(&self, element: &ElementDescriptor) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != element.tag {
                return false;
            }
        }
        if !self
            .ids
            .iter()
            .all(|id| element.id.as_deref() == Some(id.as_str()))
        {
            return false;
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.pseudo.is_none_or(|q| q.matches(element))
    }

    /// Store key for this node when it is the subject of a selector.
    pub fn key(&self) -> String {
        let tag = self.tag.as_deref().unwrap_or("");
        if let Some(id) = self.ids.first() {
            return format!("{}#{}", tag, id);
        }
        if let Some(class) = self.classes.first() {
            return format!("{}.{}", tag, class);
        }
        if tag.is_empty() {
            "*".to_string()
        } else {
            tag.to_string()
        }
    }
}

impl fmt::Display for SelectorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}", tag)?,
            None if self.classes.is_empty() && self.ids.is_empty() && self.pseudo.is_none() => {
                write!(f, "*")?
            }
            None => {}
        }
        for id in &self.ids {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        if let Some(q) = self.pseudo {
            write!(f, "{}", q.name())?;
        }
        Ok(())
    }
}

/// CSS specificity triple; the derived ordering is lexicographic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub tags: u16,
}

impl Specificity {
    pub const fn new(ids: u16, classes: u16, tags: u16) -> Self {
        Self { ids, classes, tags }
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.ids, self.classes, self.tags)
    }
}

/// A complex selector; the last node is the subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    nodes: Vec<SelectorNode>,
    specificity: Specificity,
}

/// Key of the synthetic selector `@font-face` blocks are filed under.
pub const FONT_FACE_KEY: &str = "@font-face";

impl Selector {
    /// Build a selector, computing its specificity once.
    pub fn new(nodes: Vec<SelectorNode>) -> Self {
        let mut specificity = Specificity::default();
        for node in &nodes {
            specificity.ids = specificity.ids.saturating_add(node.ids.len() as u16);
            specificity.classes = specificity
                .classes
                .saturating_add(node.classes.len() as u16 + u16::from(node.pseudo.is_some()));
            specificity.tags = specificity
                .tags
                .saturating_add(u16::from(node.tag.is_some()));
        }
        Self { nodes, specificity }
    }

    /// Selector matching exactly one tag, used for inline styles.
    pub fn for_tag(tag: &str) -> Self {
        Self::new(vec![SelectorNode {
            tag: Some(tag.to_ascii_lowercase()),
            ..SelectorNode::default()
        }])
    }

    /// The synthetic `FONT_FACE` selector.
    pub fn font_face() -> Self {
        Self {
            nodes: Vec::new(),
            specificity: Specificity::default(),
        }
    }

    pub fn is_font_face(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[SelectorNode] {
        &self.nodes
    }

    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    pub fn subject(&self) -> Option<&SelectorNode> {
        self.nodes.last()
    }

    /// Whether the selector is a single compound with no combinators.
    pub fn is_subject_only(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn key(&self) -> String {
        match self.subject() {
            Some(subject) => subject.key(),
            None => FONT_FACE_KEY.to_string(),
        }
    }

    /// Match against the subject of `path`, honoring every combinator.
    ///
    /// Adjacent-sibling chains only see one sibling back per level.
    pub fn matches(&self, path: &ElementPath<'_>) -> bool {
        let levels = path.levels();
        if self.nodes.is_empty() || levels.is_empty() {
            return false;
        }
        self.match_node(self.nodes.len() - 1, Target::Level(levels.len() - 1), levels)
    }

    /// Match only the subject compound against a bare element.
    pub fn matches_element(&self, element: &ElementDescriptor) -> bool {
        self.is_subject_only() && self.nodes[0].matches_element(element)
    }

    fn match_node(&self, node_idx: usize, target: Target, levels: &[ElementLevel]) -> bool {
        let node = &self.nodes[node_idx];
        let Some(element) = target.element(levels) else {
            return false;
        };
        if !node.matches_element(element) {
            return false;
        }
        if node_idx == 0 {
            return true;
        }
        let level = target.level();
        match node.combinator {
            Combinator::Child => {
                level > 0 && self.match_node(node_idx - 1, Target::Level(level - 1), levels)
            }
            Combinator::Descendant | Combinator::None => (0..level)
                .rev()
                .any(|parent| self.match_node(node_idx - 1, Target::Level(parent), levels)),
            Combinator::Adjacent => match target {
                Target::Level(idx) => self.match_node(node_idx - 1, Target::SiblingOf(idx), levels),
                Target::SiblingOf(_) => false,
            },
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "{}", FONT_FACE_KEY);
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx > 0 {
                match node.combinator {
                    Combinator::Child => write!(f, " > ")?,
                    Combinator::Adjacent => write!(f, " + ")?,
                    Combinator::Descendant | Combinator::None => write!(f, " ")?,
                }
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Target {
    Level(usize),
    SiblingOf(usize),
}

impl Target {
    fn level(self) -> usize {
        match self {
            Self::Level(idx) | Self::SiblingOf(idx) => idx,
        }
    }

    fn element(self, levels: &[ElementLevel]) -> Option<&ElementDescriptor> {
        match self {
            Self::Level(idx) => levels.get(idx).map(|level| &level.element),
            Self::SiblingOf(idx) => levels.get(idx).and_then(|l| l.previous_sibling.as_ref()),
        }
    }
}
