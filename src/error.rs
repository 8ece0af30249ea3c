//! Error and diagnostic types shared by the style pipeline.

use core::fmt;

/// Pipeline phase an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    /// Stylesheet tokenizing/parsing.
    Style,
    /// XHTML walking and flow-stream preparation.
    Prep,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Style => write!(f, "style"),
            Self::Prep => write!(f, "prep"),
        }
    }
}

/// Typed actual-vs-limit context for limit breaches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLimitContext {
    /// Name of the limit that was exceeded.
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured cap.
    pub limit: usize,
}

impl ErrorLimitContext {
    pub fn new(kind: &'static str, actual: usize, limit: usize) -> Self {
        Self {
            kind,
            actual,
            limit,
        }
    }
}

/// Extended optional context for style errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleErrorContext {
    /// Stylesheet href, inline style location or walker stage.
    pub source: Option<Box<str>>,
    /// Offending selector text.
    pub selector: Option<Box<str>>,
    /// Byte offset into the source being read.
    pub token_offset: Option<usize>,
}

/// Structured error for the hard failures of the style pipeline.
///
/// Malformed CSS is never reported through this type; it is recovered from
/// and surfaced as [`CssDiagnostic`]s. Only exceeded resource limits and
/// malformed XHTML end a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleError {
    /// Processing phase where this error originated.
    pub phase: ErrorPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional document path context.
    pub path: Option<Box<str>>,
    /// Optional typed actual-vs-limit context.
    pub limit: Option<Box<ErrorLimitContext>>,
    /// Optional additional context.
    pub context: Option<Box<StyleErrorContext>>,
}

impl StyleError {
    pub(crate) fn new_with_phase(
        phase: ErrorPhase,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            path: None,
            limit: None,
            context: None,
        }
    }

    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self::new_with_phase(ErrorPhase::Style, code, message)
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into().into_boxed_str());
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.limit = Some(Box::new(ErrorLimitContext::new(kind, actual, limit)));
        self
    }

    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        self.context_mut().source = Some(source.into().into_boxed_str());
        self
    }

    pub(crate) fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.context_mut().selector = Some(selector.into().into_boxed_str());
        self
    }

    pub(crate) fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.context_mut().token_offset = Some(token_offset);
        self
    }

    fn context_mut(&mut self) -> &mut StyleErrorContext {
        self.context
            .get_or_insert_with(|| Box::new(StyleErrorContext::default()))
    }
}

impl fmt::Display for StyleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(path) = self.path.as_deref() {
            write!(f, " [path={}]", path)?;
        }
        if let Some(limit) = self.limit.as_deref() {
            write!(
                f,
                " [limit_kind={} actual={} limit={}]",
                limit.kind, limit.actual, limit.limit
            )?;
        }
        if let Some(ctx) = &self.context {
            if let Some(source) = ctx.source.as_deref() {
                write!(f, " [source={}]", source)?;
            }
            if let Some(selector) = ctx.selector.as_deref() {
                write!(f, " [selector={}]", selector)?;
            }
            if let Some(token_offset) = ctx.token_offset {
                write!(f, " [token_offset={}]", token_offset)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for StyleError {}

/// A recovered CSS problem.
///
/// The parser keeps going after every one of these; they exist so callers and
/// tests can see what was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssDiagnostic {
    /// Byte offset in the stylesheet where recovery started.
    pub offset: usize,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
}

impl CssDiagnostic {
    pub(crate) fn new(offset: usize, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            offset,
            code,
            message: message.into().into_boxed_str(),
        }
    }
}

impl fmt::Display for CssDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}: {}", self.code, self.offset, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_error_display_includes_context() {
        let err = StyleError::new("STYLE_CSS_TOO_LARGE", "too big")
            .with_path("OEBPS/style.css")
            .with_limit("max_css_bytes", 10, 4)
            .with_token_offset(3);
        let text = err.to_string();
        assert!(text.starts_with("style:STYLE_CSS_TOO_LARGE: too big"));
        assert!(text.contains("[path=OEBPS/style.css]"));
        assert!(text.contains("[limit_kind=max_css_bytes actual=10 limit=4]"));
        assert!(text.contains("[token_offset=3]"));
    }

    #[test]
    fn phase_override_is_reported() {
        let err = StyleError::new_with_phase(ErrorPhase::Prep, "PREP_XML_ERROR", "bad tag")
            .with_source("xml tokenizer");
        assert_eq!(err.phase, ErrorPhase::Prep);
        assert!(err.to_string().contains("[source=xml tokenizer]"));
    }
}
