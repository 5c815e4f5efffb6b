//! Byte-exact source patching.
//!
//! All rewriting in this crate funnels through [`apply_patches`]: record the
//! byte spans to change while walking the AST, then splice the new texts
//! into the original string back to front so earlier offsets stay valid.
//! Everything outside the patched spans is untouched, which is what keeps
//! comments, blank lines, and formatting intact.

use crate::model::Span;
use crate::replacer::Candidate;

/// A single span replacement.
#[derive(Debug, Clone)]
pub struct Patch {
    pub span: Span,
    pub new_text: String,
}

impl From<&Candidate> for Patch {
    fn from(candidate: &Candidate) -> Self {
        Patch {
            span: candidate.span,
            new_text: candidate.new_text.clone(),
        }
    }
}

/// Applies non-overlapping patches to `source`. Patch order does not
/// matter; they are sorted by start offset descending before splicing.
pub fn apply_patches(source: &str, patches: &[Patch]) -> String {
    let mut patches: Vec<&Patch> = patches.iter().collect();
    patches.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut result = source.to_string();
    for patch in patches {
        result.replace_range(patch.span.start..patch.span.end, &patch.new_text);
    }
    result
}
