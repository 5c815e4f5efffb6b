//! Core data model shared by the extraction, substitution, and removal passes.
//!
//! A [`ReplacementTemplate`] is the placeholder-bearing expression extracted
//! from a marked construct's body; an [`ExtractionFailure`] explains why a
//! marked construct could not produce one. Both carry the [`ConstructKind`]
//! decided once during classification and never re-inspected afterwards.

use rustpython_parser::ast::Ranged;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Byte span of a node in the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn of<N: Ranged>(node: &N) -> Self {
        let range = node.range();
        Span {
            start: usize::from(range.start()),
            end: usize::from(range.end()),
        }
    }

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// True when `other` lies entirely within this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// What kind of definition carried the deprecation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    Function,
    Property,
    Classmethod,
    Staticmethod,
    AsyncFunction,
    Class,
    ClassAttribute,
    ModuleAttribute,
}

impl ConstructKind {
    /// The placeholder bound from the object expression of an
    /// attribute-style call, if this kind has one.
    pub fn receiver(&self) -> Option<&'static str> {
        match self {
            ConstructKind::Function | ConstructKind::AsyncFunction | ConstructKind::Property => {
                Some("self")
            }
            ConstructKind::Classmethod => Some("cls"),
            ConstructKind::Staticmethod
            | ConstructKind::Class
            | ConstructKind::ClassAttribute
            | ConstructKind::ModuleAttribute => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ConstructKind::Function => "Function",
            ConstructKind::Property => "Property",
            ConstructKind::Classmethod => "Class method",
            ConstructKind::Staticmethod => "Static method",
            ConstructKind::AsyncFunction => "Async function",
            ConstructKind::Class => "Class",
            ConstructKind::ClassAttribute => "Class attribute",
            ConstructKind::ModuleAttribute => "Module attribute",
        }
    }
}

/// One marked definition found during collection, whether or not a template
/// could be extracted from it. Version fields come from the marker's
/// `since=` / `remove_in=` arguments.
#[derive(Debug, Clone, Serialize)]
pub struct Construct {
    /// Qualified for nested attributes (`Class.attr`), short otherwise.
    pub name: String,
    pub kind: ConstructKind,
    pub since: Option<String>,
    pub remove_in: Option<String>,
    /// Span of the whole definition, markers included.
    pub span: Span,
}

/// The extracted, placeholder-bearing expression standing in for a marked
/// construct's body. `{name}` tokens mark formal parameters; `{self}` or
/// `{cls}` mark the receiver for instance-like constructs.
#[derive(Debug, Clone, Serialize)]
pub struct ReplacementTemplate {
    /// Exact source text of the replacement expression with parameters
    /// replaced by `{name}` placeholders.
    pub expr: String,
    pub kind: ConstructKind,
    /// Positionally bindable parameter names, receiver excluded, in
    /// declaration order.
    pub positional: Vec<String>,
    /// Keyword-only parameter names; bindable by keyword only.
    pub keyword_only: Vec<String>,
    /// The construct declared `*args` and/or `**kwargs`; substitution is
    /// best-effort passthrough for surplus caller arguments.
    pub has_vararg: bool,
    pub has_kwarg: bool,
}

impl ReplacementTemplate {
    /// All ordinary placeholder names, in binding order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.positional
            .iter()
            .chain(self.keyword_only.iter())
            .map(String::as_str)
    }

    /// Human-readable form for the info listing.
    pub fn display_expr(&self) -> &str {
        &self.expr
    }
}

/// Closed set of reasons a marked construct cannot be turned into a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("body is empty")]
    EmptyBody,
    #[error("body has more than one statement")]
    MultiStatementBody,
    #[error("body has no return statement")]
    NoReturn,
    #[error("return statement has no value")]
    EmptyReturn,
    #[error("signature uses variadic parameters")]
    VariadicParams,
    #[error("replacement expression calls the construct itself")]
    Recursive,
    #[error("body contains local imports")]
    LocalImports,
}

/// Why one construct was excluded from (or degraded in) the active
/// replacement set. Never fatal to the rest of the file.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{name}: {reason} ({detail})")]
pub struct ExtractionFailure {
    pub name: String,
    pub kind: ConstructKind,
    pub reason: FailureReason,
    pub detail: String,
}

impl ExtractionFailure {
    pub fn new(
        name: impl Into<String>,
        kind: ConstructKind,
        reason: FailureReason,
        detail: impl Into<String>,
    ) -> Self {
        ExtractionFailure {
            name: name.into(),
            kind,
            reason,
            detail: detail.into(),
        }
    }
}

/// Lookup table of name -> template in effect for one migration run. Keys
/// are short names for local definitions and locally-used aliases for
/// imported ones.
pub type ActiveReplacementSet = HashMap<String, ReplacementTemplate>;

/// One `from module import names` fact collected while parsing the primary
/// file, consumed by the import resolver.
#[derive(Debug, Clone, Serialize)]
pub struct ImportBinding {
    pub module: String,
    /// `(name, alias)` pairs; the name `*` denotes a star import.
    pub names: Vec<(String, Option<String>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_depends_on_kind() {
        assert_eq!(ConstructKind::Function.receiver(), Some("self"));
        assert_eq!(ConstructKind::Property.receiver(), Some("self"));
        assert_eq!(ConstructKind::Classmethod.receiver(), Some("cls"));
        assert_eq!(ConstructKind::Staticmethod.receiver(), None);
        assert_eq!(ConstructKind::ModuleAttribute.receiver(), None);
    }

    #[test]
    fn failure_displays_name_reason_and_detail() {
        let failure = ExtractionFailure::new(
            "old_func",
            ConstructKind::Function,
            FailureReason::MultiStatementBody,
            "2 statements after the docstring",
        );
        assert_eq!(
            failure.to_string(),
            "old_func: body has more than one statement (2 statements after the docstring)"
        );
    }

    #[test]
    fn span_containment() {
        let outer = Span::new(10, 40);
        assert!(outer.contains(&Span::new(10, 40)));
        assert!(outer.contains(&Span::new(15, 20)));
        assert!(!outer.contains(&Span::new(5, 20)));
        assert!(!outer.contains(&Span::new(30, 45)));
    }

    #[test]
    fn placeholders_follow_declaration_order() {
        let template = ReplacementTemplate {
            expr: "new_func({a}, {b}, flag={c})".to_string(),
            kind: ConstructKind::Function,
            positional: vec!["a".to_string(), "b".to_string()],
            keyword_only: vec!["c".to_string()],
            has_vararg: false,
            has_kwarg: false,
        };
        let names: Vec<_> = template.placeholders().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
