//! Approval-reply grammar and resolution.
//!
//! Parsing is pure and decoupled from the side-effecting apply step: the
//! reply text becomes a tagged [`ReplyCommand`], and [`resolve_reply`] turns
//! a command plus the pending batch into the exact set of category
//! assignments to apply. Out-of-range indices and unmatched category text
//! are warnings, never hard failures.

use regex::Regex;
use std::sync::OnceLock;

use crate::store::PendingBatch;
use crate::transaction::{Transaction, FALLBACK_CATEGORY};

/// A parsed approval reply. Case-insensitive; first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyCommand {
    /// `approve all`
    ApproveAll,
    /// `approve 1,3,5` (1-based indices)
    ApproveIndices(Vec<usize>),
    /// `1: Dining` lines, newline- or comma-separated
    Override(Vec<(usize, String)>),
    /// `skip` — leave the batch for the next cycle
    Skip,
    /// Anything else — no state mutation, help message only
    Unrecognized,
}

pub fn parse_reply(text: &str) -> ReplyCommand {
    static OVERRIDE_RE: OnceLock<Regex> = OnceLock::new();
    let override_re =
        OVERRIDE_RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*:\s*(.+?)\s*$").expect("literal"));

    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("approve all") {
        return ReplyCommand::ApproveAll;
    }

    if let Some(rest) = lower.strip_prefix("approve ") {
        let indices: Vec<usize> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if !indices.is_empty() {
            return ReplyCommand::ApproveIndices(indices);
        }
        return ReplyCommand::Unrecognized;
    }

    // Overrides: one or more "N: Category" pieces.
    let pieces: Vec<&str> = trimmed
        .split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !pieces.is_empty() {
        let overrides: Vec<(usize, String)> = pieces
            .iter()
            .filter_map(|p| {
                override_re.captures(p).and_then(|c| {
                    let idx: usize = c[1].parse().ok()?;
                    Some((idx, c[2].to_string()))
                })
            })
            .collect();
        // All pieces must parse, otherwise this isn't an override reply.
        if !overrides.is_empty() && overrides.len() == pieces.len() {
            return ReplyCommand::Override(overrides);
        }
    }

    if lower == "skip" {
        return ReplyCommand::Skip;
    }

    ReplyCommand::Unrecognized
}

/// One category assignment the budget service should apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub transaction: Transaction,
    pub category: String,
}

/// What a reply means for the pending batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub approvals: Vec<Approval>,
    pub warnings: Vec<String>,
    /// True for every recognized non-skip reply: the batch is resolved and
    /// removed even when some indices were omitted.
    pub clear_batch: bool,
    pub help_requested: bool,
}

/// Resolve a parsed command against the pending batch. Pure: the caller
/// applies the approvals and clears the batch.
pub fn resolve_reply(
    command: &ReplyCommand,
    batch: &PendingBatch,
    valid_categories: &[String],
) -> Resolution {
    let mut res = Resolution::default();
    let size = batch.suggestions.len();

    match command {
        ReplyCommand::ApproveAll => {
            res.clear_batch = true;
            for s in &batch.suggestions {
                res.approvals.push(Approval {
                    transaction: s.transaction.clone(),
                    category: s.category.clone(),
                });
            }
        }
        ReplyCommand::ApproveIndices(indices) => {
            res.clear_batch = true;
            let mut seen = Vec::new();
            for &i in indices {
                if i < 1 || i > size {
                    res.warnings
                        .push(format!("index {i} is out of range (batch has {size})"));
                    continue;
                }
                if seen.contains(&i) {
                    continue;
                }
                seen.push(i);
                let s = &batch.suggestions[i - 1];
                res.approvals.push(Approval {
                    transaction: s.transaction.clone(),
                    category: s.category.clone(),
                });
            }
        }
        ReplyCommand::Override(overrides) => {
            res.clear_batch = true;
            for (i, text) in overrides {
                if *i < 1 || *i > size {
                    res.warnings
                        .push(format!("index {i} is out of range (batch has {size})"));
                    continue;
                }
                let s = &batch.suggestions[*i - 1];
                let category = match match_category(valid_categories, text) {
                    Some(name) => name,
                    None => {
                        res.warnings.push(format!(
                            "no category matches '{text}'; using {FALLBACK_CATEGORY}"
                        ));
                        FALLBACK_CATEGORY.to_string()
                    }
                };
                res.approvals.push(Approval {
                    transaction: s.transaction.clone(),
                    category,
                });
            }
        }
        ReplyCommand::Skip => {}
        ReplyCommand::Unrecognized => {
            res.help_requested = true;
        }
    }

    res
}

/// The fixed help text returned for unrecognized replies.
pub fn help_message() -> String {
    "I didn't understand that. Try:\n\
     • `approve all`\n\
     • `approve 1,3,5`\n\
     • `1: Category Name`\n\
     • `skip`"
        .to_string()
}

/// The category to actually apply for an approval. A learned pattern can
/// name a category the budget has since deleted; those degrade to the
/// fallback so the stale name is never re-learned or reported as applied.
/// Returns the canonical name and whether the requested one was degraded.
pub fn final_category(valid: &[String], requested: &str) -> (String, bool) {
    match valid.iter().find(|c| c.eq_ignore_ascii_case(requested)) {
        Some(c) => (c.clone(), false),
        None => (FALLBACK_CATEGORY.to_string(), true),
    }
}

/// Match free category text against the valid set: exact (case-insensitive),
/// then substring, then nearest by edit distance within a small bound.
pub fn match_category(valid: &[String], text: &str) -> Option<String> {
    let wanted = text.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some(c) = valid.iter().find(|c| c.to_lowercase() == wanted) {
        return Some(c.clone());
    }

    if let Some(c) = valid.iter().find(|c| c.to_lowercase().contains(&wanted)) {
        return Some(c.clone());
    }

    valid
        .iter()
        .map(|c| (levenshtein_distance(&c.to_lowercase(), &wanted), c))
        .filter(|(d, _)| *d <= 3)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, c)| c.clone())
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    if left == right {
        return 0;
    }
    if left.is_empty() {
        return right.chars().count();
    }
    if right.is_empty() {
        return left.chars().count();
    }

    let right_chars: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right_chars.len()).collect();

    for (li, lc) in left.chars().enumerate() {
        let mut current = vec![li + 1];
        for (ri, rc) in right_chars.iter().enumerate() {
            let insertion = current[ri] + 1;
            let deletion = previous[ri + 1] + 1;
            let substitution = previous[ri] + usize::from(lc != *rc);
            current.push(insertion.min(deletion).min(substitution));
        }
        previous = current;
    }

    previous[right_chars.len()]
}
