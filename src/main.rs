//! supersede: migrate callers of deprecated Python APIs.
//!
//! Scans Python files for constructs carrying the `replace_me` marker,
//! rewrites their call sites using replacement expressions extracted from
//! the deprecated bodies, and deletes definitions whose removal is due.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use walkdir::WalkDir;

use supersede::check::{self, CheckReport, ConstructInfo};
use supersede::cli::{Args, Commands};
use supersede::interactive::{console_prompt, Decision};
use supersede::migrate;
use supersede::remover::{self, RemovalPolicy};
use supersede::replacer::Candidate;
use supersede::resolver;
use supersede::version;

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Migrate {
            write,
            interactive,
            paths,
            exclude,
            no_default_excludes,
            project_root,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_migrate(
                write,
                interactive,
                paths,
                &exclude,
                no_default_excludes,
                project_root,
            )
        }
        Commands::Remove {
            write,
            all,
            before,
            current_version,
            paths,
            exclude,
            no_default_excludes,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_remove(
                write,
                all,
                before.as_deref(),
                current_version.as_deref(),
                paths,
                &exclude,
                no_default_excludes,
            )
        }
        Commands::Check {
            paths,
            exclude,
            no_default_excludes,
            json,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_check(paths, &exclude, no_default_excludes, json)
        }
        Commands::Info {
            paths,
            exclude,
            no_default_excludes,
            json,
        } => {
            init_tracing(false);
            cmd_info(paths, &exclude, no_default_excludes, json)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "supersede=debug" } else { "supersede=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_migrate(
    write: bool,
    interactive: bool,
    paths: Option<Vec<PathBuf>>,
    exclude: &[String],
    no_default_excludes: bool,
    project_root: Option<PathBuf>,
) -> Result<()> {
    let scan_paths = paths.unwrap_or_else(|| vec![PathBuf::from(".")]);
    let files = collect_python_files(&scan_paths, exclude, no_default_excludes)?;
    let root = project_root.unwrap_or_else(|| PathBuf::from("."));
    let module_resolver = resolver::file_resolver(root);

    let mut total_replaced = 0;
    let mut total_degraded = 0;
    let mut changed_files = 0;
    let mut aborted = false;

    for file in &files {
        let mut prompt = |candidate: &Candidate| -> Decision {
            println!("\n{}", file.display().to_string().bold());
            console_prompt(candidate)
        };
        let result = if interactive {
            migrate::migrate_file(file, Some(&module_resolver), Some(&mut prompt), write)
        } else {
            migrate::migrate_file(file, Some(&module_resolver), None, write)
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("{} {}: {err:#}", "warn:".yellow().bold(), file.display());
                continue;
            }
        };

        if outcome.changed() {
            changed_files += 1;
            total_replaced += outcome.replaced;
            total_degraded += outcome.degraded;
            println!(
                "{} {} ({} replacement(s){})",
                if write { "Updated:" } else { "Would update:" }.yellow().bold(),
                file.display(),
                outcome.replaced,
                if outcome.degraded > 0 {
                    format!(", {} best-effort", outcome.degraded)
                } else {
                    String::new()
                }
            );
        }
        if outcome.aborted {
            aborted = true;
            break;
        }
    }

    if changed_files == 0 {
        println!("{} No call sites to migrate", "info:".blue().bold());
    } else {
        println!(
            "{} {} replacement(s) in {} file(s){}",
            "ok:".green().bold(),
            total_replaced,
            changed_files,
            if total_degraded > 0 {
                format!(", {} best-effort", total_degraded)
            } else {
                String::new()
            }
        );
    }
    if aborted {
        println!("{} Aborted; remaining files untouched", "info:".blue().bold());
    }
    if !write && total_replaced > 0 {
        println!("{} Use --write to apply changes", "hint:".cyan().bold());
    }

    Ok(())
}

fn cmd_remove(
    write: bool,
    all: bool,
    before: Option<&str>,
    current_version: Option<&str>,
    paths: Option<Vec<PathBuf>>,
    exclude: &[String],
    no_default_excludes: bool,
) -> Result<()> {
    let policy = RemovalPolicy {
        remove_all: all,
        before_version: before
            .map(|v| {
                version::parse_lenient(v)
                    .with_context(|| format!("invalid version '{v}' for --before"))
            })
            .transpose()?,
        current_version: current_version
            .map(|v| {
                version::parse_lenient(v)
                    .with_context(|| format!("invalid version '{v}' for --current-version"))
            })
            .transpose()?,
    };
    if !policy.remove_all && policy.before_version.is_none() && policy.current_version.is_none() {
        anyhow::bail!("nothing selected for removal; pass --all, --before, or --current-version");
    }

    let scan_paths = paths.unwrap_or_else(|| vec![PathBuf::from(".")]);
    let files = collect_python_files(&scan_paths, exclude, no_default_excludes)?;

    let mut total_removed = 0;
    for file in &files {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("{} {}: {err}", "warn:".yellow().bold(), file.display());
                continue;
            }
        };
        let (removed, result) = match remover::remove_constructs(&source, &policy) {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("{} {}: {err:#}", "warn:".yellow().bold(), file.display());
                continue;
            }
        };
        if removed == 0 {
            continue;
        }
        total_removed += removed;
        println!(
            "{} {} ({} construct(s))",
            if write { "Updated:" } else { "Would update:" }.yellow().bold(),
            file.display(),
            removed
        );
        if write {
            std::fs::write(file, result)
                .with_context(|| format!("failed to write {}", file.display()))?;
        }
    }

    if total_removed == 0 {
        println!("{} No constructs due for removal", "info:".blue().bold());
    } else {
        println!(
            "{} {} construct(s) removed",
            "ok:".green().bold(),
            total_removed
        );
        if !write {
            println!("{} Use --write to apply changes", "hint:".cyan().bold());
        }
    }

    Ok(())
}

/// Per-file check result as emitted with `--json`.
#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    #[serde(flatten)]
    report: CheckReport,
}

fn cmd_check(
    paths: Option<Vec<PathBuf>>,
    exclude: &[String],
    no_default_excludes: bool,
    json: bool,
) -> Result<()> {
    let scan_paths = paths.unwrap_or_else(|| vec![PathBuf::from(".")]);
    let files = collect_python_files(&scan_paths, exclude, no_default_excludes)?;

    let mut reports = Vec::new();
    for file in &files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        match check::check_source(&source) {
            Ok(report) => reports.push(FileReport {
                file: file.clone(),
                report,
            }),
            Err(err) => {
                eprintln!("{} {}: {err:#}", "warn:".yellow().bold(), file.display());
            }
        }
    }

    let checked: usize = reports.iter().map(|r| r.report.checked).sum();
    let failed = reports.iter().any(|r| !r.report.success());

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            for warning in &report.report.warnings {
                println!(
                    "{} {}: {}",
                    "warn:".yellow().bold(),
                    report.file.display(),
                    warning
                );
            }
            for failure in &report.report.failures {
                println!(
                    "{} {}: {}",
                    "error:".red().bold(),
                    report.file.display(),
                    failure
                );
            }
        }
        if failed {
            println!("{} Some constructs cannot be migrated", "error:".red().bold());
        } else {
            println!(
                "{} {} construct(s) checked, all migratable",
                "ok:".green().bold(),
                checked
            );
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Per-file listing as emitted with `--json`.
#[derive(Debug, Serialize)]
struct FileListing {
    file: PathBuf,
    constructs: Vec<ConstructInfo>,
}

fn cmd_info(
    paths: Option<Vec<PathBuf>>,
    exclude: &[String],
    no_default_excludes: bool,
    json: bool,
) -> Result<()> {
    let scan_paths = paths.unwrap_or_else(|| vec![PathBuf::from(".")]);
    let files = collect_python_files(&scan_paths, exclude, no_default_excludes)?;

    let mut listings = Vec::new();
    for file in &files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        match check::list_constructs(&source) {
            Ok(constructs) if !constructs.is_empty() => listings.push(FileListing {
                file: file.clone(),
                constructs,
            }),
            Ok(_) => {}
            Err(err) => {
                eprintln!("{} {}: {err:#}", "warn:".yellow().bold(), file.display());
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("{} No marked constructs found", "info:".blue().bold());
        return Ok(());
    }

    for listing in &listings {
        println!("\n{}", listing.file.display().to_string().bold());
        for info in &listing.constructs {
            let versions = match (&info.since, &info.remove_in) {
                (Some(s), Some(r)) => format!(" (since {s}, remove in {r})"),
                (Some(s), None) => format!(" (since {s})"),
                (None, Some(r)) => format!(" (remove in {r})"),
                (None, None) => String::new(),
            };
            match (&info.replacement, &info.problem) {
                (Some(replacement), _) => println!(
                    "  {} {}{} {} {}",
                    info.kind.describe().dimmed(),
                    info.name.red(),
                    versions.dimmed(),
                    "->".green(),
                    replacement.green()
                ),
                (None, Some(problem)) => println!(
                    "  {} {}{} {}",
                    info.kind.describe().dimmed(),
                    info.name.red(),
                    versions.dimmed(),
                    format!("({problem})").dimmed()
                ),
                (None, None) => println!(
                    "  {} {}{}",
                    info.kind.describe().dimmed(),
                    info.name.red(),
                    versions.dimmed()
                ),
            }
        }
    }

    Ok(())
}

/// Collect all .py files from the given paths, skipping hidden and
/// underscore-prefixed entries unless disabled, plus any exclude globs.
fn collect_python_files(
    paths: &[PathBuf],
    exclude: &[String],
    no_default_excludes: bool,
) -> Result<Vec<PathBuf>> {
    let patterns = exclude
        .iter()
        .map(|e| glob::Pattern::new(e).with_context(|| format!("invalid exclude pattern '{e}'")))
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| !is_excluded(e, &patterns, no_default_excludes))
        {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "py")
            {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_excluded(
    entry: &walkdir::DirEntry,
    patterns: &[glob::Pattern],
    no_default_excludes: bool,
) -> bool {
    // Depth 0 is the scan root itself; never filter it.
    if entry.depth() == 0 {
        return false;
    }
    let name = match entry.file_name().to_str() {
        Some(name) => name,
        None => return false,
    };
    if !no_default_excludes {
        if name.starts_with('.') {
            return true;
        }
        // Dunder modules like __init__.py stay in; __pycache__ and other
        // underscore-prefixed entries do not.
        let dunder_module = name.starts_with("__") && name.ends_with(".py");
        if name.starts_with('_') && !dunder_module {
            return true;
        }
    }
    patterns
        .iter()
        .any(|p| p.matches(name) || p.matches_path(entry.path()))
}
