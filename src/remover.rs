//! Version-gated removal of deprecated definitions.
//!
//! Once callers have been migrated, the marked definitions themselves can
//! go. A construct is due for removal when the policy says so: everything,
//! everything whose `remove_in` the current version has reached, or
//! everything deprecated `since` before a given version. Spans are expanded
//! to whole lines, decorators included, and deleted with the same patching
//! machinery the migrator uses.

use anyhow::Result;
use semver::Version;
use tracing::debug;

use crate::collector;
use crate::model::{Construct, Span};
use crate::rewriter::{apply_patches, Patch};
use crate::version;

/// Which deprecated constructs to delete.
#[derive(Debug, Default, Clone)]
pub struct RemovalPolicy {
    /// Delete every marked construct regardless of version.
    pub remove_all: bool,
    /// Delete constructs whose `since` predates this version.
    pub before_version: Option<Version>,
    /// Delete constructs whose `remove_in` this version has reached.
    pub current_version: Option<Version>,
}

impl RemovalPolicy {
    fn is_due(&self, construct: &Construct) -> bool {
        if self.remove_all {
            return true;
        }
        if let (Some(current), Some(remove_in)) = (&self.current_version, &construct.remove_in) {
            if let Some(target) = version::parse_lenient(remove_in) {
                if version::has_reached(current, &target) {
                    return true;
                }
            }
        }
        if let (Some(before), Some(since)) = (&self.before_version, &construct.since) {
            if let Some(since) = version::parse_lenient(since) {
                if version::is_before(&since, before) {
                    return true;
                }
            }
        }
        false
    }
}

/// Deletes every due construct from `source`. Returns the number removed
/// and the new text; with nothing due, the text comes back byte-identical.
pub fn remove_constructs(source: &str, policy: &RemovalPolicy) -> Result<(usize, String)> {
    let output = collector::collect(source)?;

    let mut patches = Vec::new();
    for construct in &output.constructs {
        if !policy.is_due(construct) {
            continue;
        }
        debug!(name = %construct.name, "removing deprecated construct");
        patches.push(Patch {
            span: line_span(source, construct.span),
            new_text: String::new(),
        });
    }

    if patches.is_empty() {
        return Ok((0, source.to_string()));
    }

    let mut result = apply_patches(source, &patches);
    if !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    Ok((patches.len(), result))
}

/// Expands a construct span to full lines, trailing newline included.
fn line_span(source: &str, span: Span) -> Span {
    let start = source[..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = match source[span.end..].find('\n') {
        Some(offset) => span.end + offset + 1,
        None => source.len(),
    };
    Span::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: &str) -> Version {
        version::parse_lenient(v).unwrap()
    }

    fn remove_all(source: &str) -> (usize, String) {
        let policy = RemovalPolicy {
            remove_all: true,
            ..Default::default()
        };
        remove_constructs(source, &policy).unwrap()
    }

    #[test]
    fn removes_whole_definition_with_decorators() {
        let source = concat!(
            "import os\n",
            "@replace_me(since=\"1.0\")\n",
            "def old_func(x):\n",
            "    return new_func(x)\n",
            "def keeper():\n",
            "    return 1\n",
        );
        let (count, result) = remove_all(source);
        assert_eq!(count, 1);
        assert_eq!(result, "import os\ndef keeper():\n    return 1\n");
    }

    #[test]
    fn before_version_gate() {
        let source = concat!(
            "@replace_me(since=\"0.5.0\")\n",
            "def ancient():\n",
            "    return new()\n",
            "@replace_me(since=\"2.0.0\")\n",
            "def recent():\n",
            "    return newer()\n",
        );
        let policy = RemovalPolicy {
            before_version: Some(parse("1.0.0")),
            ..Default::default()
        };
        let (count, result) = remove_constructs(source, &policy).unwrap();
        assert_eq!(count, 1);
        assert!(!result.contains("ancient"));
        assert!(result.contains("recent"));
    }

    #[test]
    fn remove_in_gate_uses_current_version() {
        let source = concat!(
            "@replace_me(since=\"1.0\", remove_in=\"2.0\")\n",
            "def due():\n",
            "    return new()\n",
            "@replace_me(since=\"1.0\", remove_in=\"3.0\")\n",
            "def not_due():\n",
            "    return new()\n",
        );
        let policy = RemovalPolicy {
            current_version: Some(parse("2.0.0")),
            ..Default::default()
        };
        let (count, result) = remove_constructs(source, &policy).unwrap();
        assert_eq!(count, 1);
        assert!(!result.contains("def due"));
        assert!(result.contains("not_due"));
    }

    #[test]
    fn unparseable_since_is_never_removed() {
        let source = "@replace_me(since=\"next-release\")\ndef old():\n    return new()\n";
        let policy = RemovalPolicy {
            before_version: Some(parse("9.0.0")),
            ..Default::default()
        };
        let (count, result) = remove_constructs(source, &policy).unwrap();
        assert_eq!(count, 0);
        assert_eq!(result, source);
    }

    #[test]
    fn nothing_due_returns_identical_source() {
        let source = "@replace_me(since=\"1.0\")\ndef old():\n    return new()\n";
        let (count, result) =
            remove_constructs(source, &RemovalPolicy::default()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(result, source);
    }

    #[test]
    fn removes_attribute_assignment_line() {
        let source = "KEEP = 1\nOLD = replace_me(NEW, since=\"0.1\")\nALSO = 2\n";
        let (count, result) = remove_all(source);
        assert_eq!(count, 1);
        assert_eq!(result, "KEEP = 1\nALSO = 2\n");
    }

    #[test]
    fn removes_stacked_decorators_and_class() {
        let source = concat!(
            "class C:\n",
            "    @property\n",
            "    @replace_me()\n",
            "    def old_prop(self):\n",
            "        return self.new_prop\n",
            "    def keep(self):\n",
            "        return 2\n",
        );
        let (count, result) = remove_all(source);
        assert_eq!(count, 1);
        assert!(!result.contains("old_prop"));
        assert!(!result.contains("@property"));
        assert!(result.contains("def keep"));
    }

    #[test]
    fn file_without_trailing_newline_gets_one() {
        let source = "keep = 1\n@replace_me()\ndef old():\n    return new()";
        let (count, result) = remove_all(source);
        assert_eq!(count, 1);
        assert_eq!(result, "keep = 1\n");
    }
}
