//! CSS cascade and flow-stream preparation for e-book pagination.
//!
//! Stylesheets are tokenized and parsed into an append-only [`RuleStore`];
//! the [`Cascade`] resolves a [`Format`] per element, and [`FlowPrep`] walks
//! XHTML into the [`FlowItem`] stream that `epub-flow-render` paginates.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod cascade;
pub mod css_parser;
pub mod css_tokenizer;
pub mod document;
pub mod error;
pub mod flow_prep;
pub mod properties;
pub mod rule_store;
pub mod selector;
pub mod values;

pub use cascade::{
    Cascade, CascadeConfig, FontResolver, FontVariant, Format, GenericFontResolver, ScreenMargins,
};
pub use css_parser::{CssParser, StyleLimits};
pub use css_tokenizer::{AtKeyword, SpannedToken, Token, Tokenizer};
pub use document::{ElementDescriptor, ElementLevel, ElementPath};
pub use error::{CssDiagnostic, ErrorLimitContext, ErrorPhase, StyleError, StyleErrorContext};
pub use flow_prep::{linked_stylesheets, FlowItem, FlowPrep, FlowPrepOptions};
pub use properties::{
    get_values_from_props, get_values_from_suite, Property, PropertyId, PropertySuite,
};
pub use rule_store::{
    FontFaceSource, MatchedRule, Origin, Rule, RuleId, RuleStore, SelectorId, SourceOrder,
    SuiteId, USER_AGENT_CSS,
};
pub use selector::{Combinator, Qualifier, Selector, SelectorNode, Specificity};
pub use values::{
    Align, DisplayKind, FontStyle, FontWeight, ResolveContext, TextTransform, Unit, Value,
    VerticalAlign,
};
