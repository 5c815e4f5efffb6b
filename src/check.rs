//! Validation and listing of marked constructs.
//!
//! `check` answers one question per file: can every marked construct
//! actually be migrated? Constructs whose bodies do not follow the
//! single-expression shape come back as failures so they can be fixed at
//! the definition rather than discovered at a call site later.

use anyhow::Result;
use serde::Serialize;

use crate::collector;
use crate::model::{ConstructKind, ExtractionFailure};

/// Outcome of checking one source text.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    /// Number of marked constructs inspected.
    pub checked: usize,
    /// Constructs that produced a usable template, in document order.
    pub valid: Vec<String>,
    /// Constructs that cannot produce a replacement template.
    pub failures: Vec<ExtractionFailure>,
    /// Constructs usable only with degraded substitution.
    pub warnings: Vec<ExtractionFailure>,
}

impl CheckReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn check_source(source: &str) -> Result<CheckReport> {
    let output = collector::collect(source)?;
    let valid = output
        .constructs
        .iter()
        .filter(|c| output.templates.contains_key(&c.name))
        .map(|c| c.name.clone())
        .collect();
    Ok(CheckReport {
        checked: output.constructs.len(),
        valid,
        failures: output.failures,
        warnings: output.warnings,
    })
}

/// One row of the `info` listing.
#[derive(Debug, Serialize)]
pub struct ConstructInfo {
    pub name: String,
    pub kind: ConstructKind,
    pub since: Option<String>,
    pub remove_in: Option<String>,
    /// The replacement expression, when one could be extracted.
    pub replacement: Option<String>,
    /// Why extraction failed, otherwise.
    pub problem: Option<String>,
}

/// Lists every marked construct with its replacement or its problem, in
/// document order.
pub fn list_constructs(source: &str) -> Result<Vec<ConstructInfo>> {
    let output = collector::collect(source)?;
    let rows = output
        .constructs
        .iter()
        .map(|construct| {
            let replacement = output
                .templates
                .get(&construct.name)
                .map(|t| t.display_expr().to_string());
            let problem = output
                .failures
                .iter()
                .find(|f| f.name == construct.name)
                .map(ExtractionFailure::to_string);
            ConstructInfo {
                name: construct.name.clone(),
                kind: construct.kind,
                since: construct.since.clone(),
                remove_in: construct.remove_in.clone(),
                replacement,
                problem,
            }
        })
        .collect();
    Ok(rows)
}
