//! Cross-module template resolution.
//!
//! A source file under migration may call deprecated functions it imports
//! from elsewhere. Resolution is driven by a caller-supplied callback that
//! maps a dotted module name to that module's source text; collection then
//! runs on the imported source and the resulting templates are re-keyed
//! under the local (possibly aliased) names. Resolution failures are
//! logged and skipped, never fatal.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::collector;
use crate::model::{ActiveReplacementSet, ImportBinding};

/// Resolves the templates visible through `imports`, keyed by the names the
/// importing file actually uses.
pub fn resolve_imports(
    imports: &[ImportBinding],
    resolver: &dyn Fn(&str) -> Option<String>,
) -> ActiveReplacementSet {
    let mut resolved = ActiveReplacementSet::new();
    for binding in imports {
        let source = match resolver(&binding.module) {
            Some(source) => source,
            None => {
                debug!(module = %binding.module, "module not resolvable, skipping");
                continue;
            }
        };
        let output = match collector::collect(&source) {
            Ok(output) => output,
            Err(err) => {
                warn!(module = %binding.module, "skipping unparseable module: {err}");
                continue;
            }
        };
        for (name, asname) in &binding.names {
            if name == "*" {
                resolved.extend(output.templates.clone());
                continue;
            }
            let local = asname.as_deref().unwrap_or(name);
            for (key, template) in &output.templates {
                if key == name {
                    resolved.insert(local.to_string(), template.clone());
                } else if let Some(rest) = key.strip_prefix(name.as_str()) {
                    // Class attributes travel with their class.
                    if rest.starts_with('.') {
                        resolved.insert(format!("{local}{rest}"), template.clone());
                    }
                }
            }
        }
    }
    resolved
}

/// Resolver that looks up modules as files under a project root: `a.b.c`
/// maps to `a/b/c.py`, falling back to `a/b/c/__init__.py`.
pub fn file_resolver(root: impl Into<PathBuf>) -> impl Fn(&str) -> Option<String> {
    let root = root.into();
    move |module: &str| {
        let rel: PathBuf = module.split('.').collect();
        let as_file = root.join(&rel).with_extension("py");
        if let Ok(source) = std::fs::read_to_string(&as_file) {
            return Some(source);
        }
        let as_package = root.join(&rel).join("__init__.py");
        std::fs::read_to_string(as_package).ok()
    }
}
