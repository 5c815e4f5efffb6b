//! Interactive per-site confirmation.
//!
//! The selection loop is pure: it walks candidates in document order and
//! asks an injected prompt callback for a [`Decision`] on each. `AcceptAll`
//! flips the loop into a no-prompt mode for the remaining sites; `Abort`
//! stops immediately, keeping what was already accepted and leaving the
//! rest untouched. The terminal prompt lives in [`console_prompt`].

use colored::Colorize;
use dialoguer::Input;

use crate::replacer::Candidate;

/// Answer to a single replacement prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
    AcceptAll,
    Abort,
}

/// Result of walking all candidates through the prompt.
#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<Candidate>,
    pub rejected: usize,
    pub aborted: bool,
}

/// Runs the confirmation loop over `candidates`, which must be in document
/// order so prompts read top to bottom.
pub fn select_candidates(
    candidates: Vec<Candidate>,
    prompt: &mut dyn FnMut(&Candidate) -> Decision,
) -> Selection {
    let mut selection = Selection::default();
    let mut accept_all = false;
    for candidate in candidates {
        if accept_all {
            selection.accepted.push(candidate);
            continue;
        }
        match prompt(&candidate) {
            Decision::Accept => selection.accepted.push(candidate),
            Decision::Reject => selection.rejected += 1,
            Decision::AcceptAll => {
                accept_all = true;
                selection.accepted.push(candidate);
            }
            Decision::Abort => {
                selection.aborted = true;
                break;
            }
        }
    }
    selection
}

/// Terminal prompt: shows the site as a minus/plus pair and reads
/// `y`/`n`/`a`/`q`. Input failure (closed stdin) aborts.
pub fn console_prompt(candidate: &Candidate) -> Decision {
    println!("{}", format!("- {}", candidate.old_text).red());
    println!("{}", format!("+ {}", candidate.new_text).green());
    if candidate.degraded {
        println!("{} replacement is best-effort", "warn:".yellow().bold());
    }
    loop {
        let answer = Input::<String>::new()
            .with_prompt("Apply this replacement? [y]es/[n]o/[a]ll/[q]uit")
            .default("y".to_string())
            .interact_text();
        match answer.as_deref().map(str::trim) {
            Ok("y") | Ok("Y") | Ok("yes") => return Decision::Accept,
            Ok("n") | Ok("N") | Ok("no") => return Decision::Reject,
            Ok("a") | Ok("A") | Ok("all") => return Decision::AcceptAll,
            Ok("q") | Ok("Q") | Ok("quit") => return Decision::Abort,
            Ok(_) => continue,
            Err(_) => return Decision::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn candidate(name: &str, start: usize) -> Candidate {
        Candidate {
            name: name.to_string(),
            span: Span::new(start, start + 4),
            old_text: "old()".to_string(),
            new_text: "new()".to_string(),
            degraded: false,
        }
    }

    fn run(decisions: Vec<Decision>, count: usize) -> Selection {
        let mut queued = decisions.into_iter();
        let candidates = (0..count).map(|i| candidate("c", i * 10)).collect();
        select_candidates(candidates, &mut |_| queued.next().unwrap())
    }

    #[test]
    fn accept_and_reject_mix() {
        let s = run(vec![Decision::Accept, Decision::Reject, Decision::Accept], 3);
        assert_eq!(s.accepted.len(), 2);
        assert_eq!(s.rejected, 1);
        assert!(!s.aborted);
    }

    #[test]
    fn accept_all_stops_prompting() {
        let mut prompts = 0;
        let candidates = (0..4).map(|i| candidate("c", i * 10)).collect();
        let s = select_candidates(candidates, &mut |_| {
            prompts += 1;
            Decision::AcceptAll
        });
        assert_eq!(prompts, 1);
        assert_eq!(s.accepted.len(), 4);
    }

    #[test]
    fn abort_keeps_prior_acceptances() {
        let s = run(vec![Decision::Accept, Decision::Abort], 3);
        assert!(s.aborted);
        assert_eq!(s.accepted.len(), 1);
        assert_eq!(s.accepted[0].span.start, 0);
    }

    #[test]
    fn reject_everything() {
        let s = run(vec![Decision::Reject, Decision::Reject], 2);
        assert!(s.accepted.is_empty());
        assert_eq!(s.rejected, 2);
    }
}
