//! Element descriptors handed to the cascade by the document walker.

use smallvec::SmallVec;

/// What the cascade needs to know about one element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementDescriptor {
    /// Lowercased local tag name.
    pub tag: String,
    /// Class names in attribute order.
    pub classes: SmallVec<[String; 2]>,
    /// `id` attribute, if any.
    pub id: Option<String>,
    /// Raw `style=` attribute text, if any.
    pub inline_style: Option<String>,
    /// Whether no element sibling precedes this element.
    pub first_child: bool,
}

impl ElementDescriptor {
    pub fn new(tag: impl Into<String>) -> Self {
        let mut tag = tag.into();
        tag.make_ascii_lowercase();
        Self {
            tag,
            first_child: true,
            ..Self::default()
        }
    }

    /// Add classes from a whitespace separated `class` attribute value.
    pub fn with_classes(mut self, class_attr: &str) -> Self {
        for class in class_attr.split_whitespace() {
            if !self.classes.iter().any(|c| c == class) {
                self.classes.push(class.to_string());
            }
        }
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_inline_style(mut self, style: impl Into<String>) -> Self {
        self.inline_style = Some(style.into());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// One level of the open-element chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementLevel {
    pub element: ElementDescriptor,
    /// Closest preceding element sibling at this level.
    pub previous_sibling: Option<ElementDescriptor>,
}

impl ElementLevel {
    pub fn new(element: ElementDescriptor) -> Self {
        Self {
            element,
            previous_sibling: None,
        }
    }

    pub fn with_previous_sibling(mut self, sibling: ElementDescriptor) -> Self {
        self.element.first_child = false;
        self.previous_sibling = Some(sibling);
        self
    }
}

/// Root-to-subject chain of open elements; the last level is the subject.
#[derive(Clone, Copy, Debug)]
pub struct ElementPath<'a> {
    levels: &'a [ElementLevel],
}

impl<'a> ElementPath<'a> {
    pub fn new(levels: &'a [ElementLevel]) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &'a [ElementLevel] {
        self.levels
    }

    /// The element being styled.
    pub fn subject(&self) -> Option<&'a ElementDescriptor> {
        self.levels.last().map(|level| &level.element)
    }
}
