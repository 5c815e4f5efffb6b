//! End-to-end migration of a source text or file.
//!
//! Ties the passes together: collect local templates, pull in templates for
//! imported names, find call-site candidates, optionally run them through
//! an interactive prompt, and patch the accepted ones into the source.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::collector;
use crate::interactive::{select_candidates, Decision};
use crate::model::ActiveReplacementSet;
use crate::replacer::{self, Candidate};
use crate::resolver;
use crate::rewriter::{apply_patches, Patch};

/// What one migration pass did to a source text.
#[derive(Debug)]
pub struct MigrateOutcome {
    /// The migrated text. Byte-identical to the input when nothing applied.
    pub text: String,
    /// Sites replaced.
    pub replaced: usize,
    /// Of those, sites replaced with best-effort substitutions.
    pub degraded: usize,
    /// Sites declined at the prompt.
    pub rejected: usize,
    /// The prompt was quit before reaching the end of the file.
    pub aborted: bool,
}

impl MigrateOutcome {
    pub fn changed(&self) -> bool {
        self.replaced > 0
    }
}

/// Migrates `source`, replacing every candidate. The resolver, when given,
/// supplies source text for imported modules so their deprecations apply
/// here too.
pub fn migrate_source(
    source: &str,
    module_resolver: Option<&dyn Fn(&str) -> Option<String>>,
) -> Result<MigrateOutcome> {
    migrate_source_with(source, module_resolver, None)
}

/// Like [`migrate_source`], but with an optional per-site prompt.
pub fn migrate_source_with(
    source: &str,
    module_resolver: Option<&dyn Fn(&str) -> Option<String>>,
    prompt: Option<&mut dyn FnMut(&Candidate) -> Decision>,
) -> Result<MigrateOutcome> {
    let templates = gather_templates(source, module_resolver)?;
    let candidates = replacer::find_candidates(source, &templates)?;

    let (accepted, rejected, aborted) = match prompt {
        Some(prompt) => {
            let selection = select_candidates(candidates, prompt);
            (selection.accepted, selection.rejected, selection.aborted)
        }
        None => (candidates, 0, false),
    };

    let mut degraded = 0;
    for candidate in &accepted {
        if candidate.degraded {
            degraded += 1;
            warn!(name = %candidate.name, "best-effort replacement: {}", candidate.new_text);
        }
    }

    let patches: Vec<Patch> = accepted.iter().map(Patch::from).collect();
    Ok(MigrateOutcome {
        text: apply_patches(source, &patches),
        replaced: accepted.len(),
        degraded,
        rejected,
        aborted,
    })
}

/// Local templates merged with those resolved through imports. An imported
/// definition wins over a same-named local one.
fn gather_templates(
    source: &str,
    module_resolver: Option<&dyn Fn(&str) -> Option<String>>,
) -> Result<ActiveReplacementSet> {
    let output = collector::collect(source)?;
    let mut templates = output.templates;
    if let Some(module_resolver) = module_resolver {
        templates.extend(resolver::resolve_imports(&output.imports, module_resolver));
    }
    Ok(templates)
}

/// Migrates a file on disk, writing back only when `write` is set and the
/// contents changed.
pub fn migrate_file(
    path: &Path,
    module_resolver: Option<&dyn Fn(&str) -> Option<String>>,
    prompt: Option<&mut dyn FnMut(&Candidate) -> Decision>,
    write: bool,
) -> Result<MigrateOutcome> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let outcome = migrate_source_with(&source, module_resolver, prompt)?;
    if write && outcome.changed() {
        std::fs::write(path, &outcome.text)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_CONTAINED: &str = concat!(
        "@replace_me(since=\"1.0\")\n",
        "def old_func(x, y):\n",
        "    return new_func(x + y)\n",
        "\n",
        "result = old_func(1, 2)\n",
    );

    #[test]
    fn migrates_local_call_sites() {
        let outcome = migrate_source(SELF_CONTAINED, None).unwrap();
        assert_eq!(outcome.replaced, 1);
        assert!(outcome.text.ends_with("result = new_func(1 + 2)\n"));
    }

    #[test]
    fn migration_is_idempotent() {
        let once = migrate_source(SELF_CONTAINED, None).unwrap();
        let twice = migrate_source(&once.text, None).unwrap();
        assert_eq!(twice.replaced, 0);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn untouched_file_is_byte_identical() {
        let source = "# comment\n\nx = 1\n\n\ndef f():\n    return 2   # odd spacing\n";
        let outcome = migrate_source(source, None).unwrap();
        assert_eq!(outcome.replaced, 0);
        assert_eq!(outcome.text, source);
    }

    #[test]
    fn imported_deprecations_apply() {
        let library = "@replace_me()\ndef old_api(x):\n    return new_api(x)\n";
        let resolver = |module: &str| (module == "mylib").then(|| library.to_string());
        let source = "from mylib import old_api\n\nold_api(7)\n";
        let outcome = migrate_source(source, Some(&resolver)).unwrap();
        assert_eq!(outcome.replaced, 1);
        assert!(outcome.text.contains("new_api(7)"));
    }

    #[test]
    fn imported_template_overrides_local() {
        let library = "@replace_me()\ndef old_api(x):\n    return imported_new(x)\n";
        let resolver = |module: &str| (module == "mylib").then(|| library.to_string());
        let source = concat!(
            "from mylib import old_api\n",
            "@replace_me()\n",
            "def old_api(x):\n",
            "    return local_new(x)\n",
            "old_api(1)\n",
        );
        let outcome = migrate_source(source, Some(&resolver)).unwrap();
        assert!(outcome.text.contains("imported_new(1)"));
    }

    #[test]
    fn interactive_abort_applies_only_prior_acceptances() {
        let source = concat!(
            "@replace_me()\n",
            "def old(x):\n",
            "    return new(x)\n",
            "a = old(1)\n",
            "b = old(2)\n",
            "c = old(3)\n",
        );
        let mut answers = vec![Decision::Accept, Decision::Abort].into_iter();
        let mut prompt = |_: &Candidate| answers.next().unwrap();
        let outcome = migrate_source_with(source, None, Some(&mut prompt)).unwrap();
        assert!(outcome.aborted);
        assert_eq!(outcome.replaced, 1);
        assert!(outcome.text.contains("a = new(1)"));
        assert!(outcome.text.contains("b = old(2)"));
        assert!(outcome.text.contains("c = old(3)"));
    }

    #[test]
    fn counts_degraded_replacements() {
        let source = concat!(
            "@replace_me()\n",
            "def old(x, y):\n",
            "    return new(x + y)\n",
            "old(1)\n",
        );
        let outcome = migrate_source(source, None).unwrap();
        assert_eq!(outcome.replaced, 1);
        assert_eq!(outcome.degraded, 1);
    }

    #[test]
    fn migrated_text_keeps_surrounding_formatting() {
        let source = concat!(
            "# module under migration\n",
            "@replace_me(since=\"1.0\")\n",
            "def old_func(x, y):\n",
            "    return new_func(x + y)\n",
            "\n",
            "\n",
            "result = old_func(1, 2)  # trailing comment\n",
        );
        let outcome = migrate_source(source, None).unwrap();
        insta::assert_snapshot!(outcome.text, @r###"
        # module under migration
        @replace_me(since="1.0")
        def old_func(x, y):
            return new_func(x + y)


        result = new_func(1 + 2)  # trailing comment
        "###);
    }

    #[test]
    fn migrate_file_writes_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.py");
        std::fs::write(&path, SELF_CONTAINED).unwrap();

        let outcome = migrate_file(&path, None, None, false).unwrap();
        assert!(outcome.changed());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SELF_CONTAINED);

        migrate_file(&path, None, None, true).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("new_func(1 + 2)"));
    }
}
