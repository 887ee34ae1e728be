//! Categorization policy: learned patterns first, the model only for the
//! remainder, and strict validation of whatever the model returns.
//!
//! The model is the expensive step, so a transaction resolved by a pattern
//! must never be included in the model batch.

use serde::{Deserialize, Serialize};

use crate::patterns::PatternBook;
use crate::transaction::{Confidence, Suggested, Transaction, FALLBACK_CATEGORY};

/// Outcome of the pattern pass.
#[derive(Debug, Clone, Default)]
pub struct PatternSplit {
    /// Resolved by a learned pattern; skip the model for these.
    pub resolved: Vec<Suggested>,
    /// Still need a model suggestion.
    pub unresolved: Vec<Transaction>,
}

/// Check every transaction against the pattern book. Matches are assigned
/// the learned category at High confidence; the rest go to the model batch.
pub fn split_by_patterns(book: &PatternBook, transactions: Vec<Transaction>) -> PatternSplit {
    let mut split = PatternSplit::default();
    for txn in transactions {
        match book.lookup(&txn.payee) {
            Some(category) => split.resolved.push(Suggested {
                category: category.to_string(),
                confidence: Confidence::High,
                transaction: txn,
            }),
            None => split.unresolved.push(txn),
        }
    }
    split
}

/// Pull account-to-account transfers out of the batch before any
/// categorization happens. Two transactions form a pair when they share a
/// date, carry opposite amounts, and each names the other's account as its
/// transfer account. Pairs need no category; a transfer leg whose mate is
/// outside the batch stays in the regular flow.
pub fn detect_transfer_pairs(
    transactions: Vec<Transaction>,
) -> (Vec<(Transaction, Transaction)>, Vec<Transaction>) {
    let (transfers, mut regular): (Vec<_>, Vec<_>) = transactions
        .into_iter()
        .partition(|t| t.transfer_account_id.is_some());

    let mut pairs = Vec::new();
    let mut paired = vec![false; transfers.len()];
    for i in 0..transfers.len() {
        if paired[i] {
            continue;
        }
        for j in (i + 1)..transfers.len() {
            if paired[j] {
                continue;
            }
            let (a, b) = (&transfers[i], &transfers[j]);
            if a.date == b.date
                && a.amount == -b.amount
                && a.transfer_account_id.as_deref() == Some(b.account_id.as_str())
                && b.transfer_account_id.as_deref() == Some(a.account_id.as_str())
            {
                paired[i] = true;
                paired[j] = true;
                pairs.push((a.clone(), b.clone()));
                break;
            }
        }
    }

    for (t, was_paired) in transfers.into_iter().zip(paired) {
        if !was_paired {
            regular.push(t);
        }
    }
    (pairs, regular)
}

/// One per-transaction answer from the categorization model, as parsed
/// from its JSON array. `transaction_number` is 1-based, in batch order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSuggestion {
    pub transaction_number: usize,
    pub category: String,
    #[serde(default)]
    pub confidence: Option<String>,
}

/// Pair model answers with the transactions they describe, forcing every
/// invalid or missing category down to the fallback at Low confidence.
///
/// Answers are matched by `transaction_number`; a transaction the model
/// skipped degrades the same way an out-of-vocabulary answer does.
pub fn validate_suggestions(
    valid_categories: &[String],
    transactions: Vec<Transaction>,
    raw: &[RawSuggestion],
) -> Vec<Suggested> {
    transactions
        .into_iter()
        .enumerate()
        .map(|(i, txn)| {
            let answer = raw.iter().find(|r| r.transaction_number == i + 1);
            match answer {
                Some(r) if in_vocabulary(valid_categories, &r.category) => {
                    // Canonical casing comes from the category set, not the model.
                    let canonical = valid_categories
                        .iter()
                        .find(|c| c.eq_ignore_ascii_case(&r.category))
                        .cloned()
                        .unwrap_or_else(|| r.category.clone());
                    Suggested {
                        category: canonical,
                        confidence: r
                            .confidence
                            .as_deref()
                            .map(Confidence::parse)
                            .unwrap_or(Confidence::Medium),
                        transaction: txn,
                    }
                }
                _ => Suggested {
                    category: FALLBACK_CATEGORY.to_string(),
                    confidence: Confidence::Low,
                    transaction: txn,
                },
            }
        })
        .collect()
}

/// Degrade an entire model batch to the fallback category. Used when the
/// model call fails or its response is unparsable: the run still proceeds
/// to notification so the user sees every transaction.
pub fn fallback_suggestions(transactions: Vec<Transaction>) -> Vec<Suggested> {
    transactions
        .into_iter()
        .map(|txn| Suggested {
            category: FALLBACK_CATEGORY.to_string(),
            confidence: Confidence::Low,
            transaction: txn,
        })
        .collect()
}

fn in_vocabulary(valid: &[String], name: &str) -> bool {
    valid.iter().any(|c| c.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn txn(id: &str, payee: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            payee: payee.to_string(),
            amount: -5_000,
            date: NaiveDate::from_ymd_opt(2026, 8, 21).unwrap(),
            category: None,
            account_id: "acct-1".to_string(),
            transfer_account_id: None,
        }
    }

    fn vocab() -> Vec<String> {
        vec!["Groceries".to_string(), "Dining".to_string(), "Gas".to_string()]
    }

    #[test]
    fn test_pattern_hits_never_reach_the_model_batch() {
        let mut book = PatternBook::new();
        book.upsert("wakaba sushi", "Dining");
        book.upsert("shell", "Gas");

        let split = split_by_patterns(
            &book,
            vec![
                txn("t1", "WAKABA SUSHI #204"),
                txn("t2", "SHELL OIL 5512"),
            ],
        );
        assert!(split.unresolved.is_empty());
        assert_eq!(split.resolved.len(), 2);
        assert!(split.resolved.iter().all(|s| s.confidence == Confidence::High));
        assert_eq!(split.resolved[0].category, "Dining");
    }

    #[test]
    fn test_unknown_merchants_go_to_the_model() {
        let book = PatternBook::new();
        let split = split_by_patterns(&book, vec![txn("t1", "NEW MERCHANT")]);
        assert!(split.resolved.is_empty());
        assert_eq!(split.unresolved.len(), 1);
    }

    #[test]
    fn test_out_of_vocabulary_category_degrades_to_fallback() {
        let raw = vec![RawSuggestion {
            transaction_number: 1,
            category: "Crypto Winnings".to_string(),
            confidence: Some("high".to_string()),
        }];
        let out = validate_suggestions(&vocab(), vec![txn("t1", "X")], &raw);
        assert_eq!(out[0].category, FALLBACK_CATEGORY);
        assert_eq!(out[0].confidence, Confidence::Low);
    }

    #[test]
    fn test_model_casing_is_canonicalized() {
        let raw = vec![RawSuggestion {
            transaction_number: 1,
            category: "dining".to_string(),
            confidence: Some("medium".to_string()),
        }];
        let out = validate_suggestions(&vocab(), vec![txn("t1", "X")], &raw);
        assert_eq!(out[0].category, "Dining");
        assert_eq!(out[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_skipped_transaction_number_degrades() {
        // Model answered #2 only; #1 falls back.
        let raw = vec![RawSuggestion {
            transaction_number: 2,
            category: "Gas".to_string(),
            confidence: None,
        }];
        let out = validate_suggestions(&vocab(), vec![txn("t1", "A"), txn("t2", "B")], &raw);
        assert_eq!(out[0].category, FALLBACK_CATEGORY);
        assert_eq!(out[1].category, "Gas");
        assert_eq!(out[1].confidence, Confidence::Medium);
    }

    fn transfer_leg(id: &str, account: &str, other: &str, amount: i64) -> Transaction {
        Transaction {
            account_id: account.to_string(),
            transfer_account_id: Some(other.to_string()),
            amount,
            ..txn(id, "Transfer : Savings")
        }
    }

    #[test]
    fn test_transfer_pair_is_pulled_out_of_the_batch() {
        let (pairs, regular) = detect_transfer_pairs(vec![
            transfer_leg("t1", "checking", "savings", -50_000),
            txn("t2", "HEB"),
            transfer_leg("t3", "savings", "checking", 50_000),
        ]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.id, "t1");
        assert_eq!(pairs[0].1.id, "t3");
        assert_eq!(regular.len(), 1);
        assert_eq!(regular[0].id, "t2");
    }

    #[test]
    fn test_mismatched_amounts_do_not_pair() {
        let (pairs, regular) = detect_transfer_pairs(vec![
            transfer_leg("t1", "checking", "savings", -50_000),
            transfer_leg("t2", "savings", "checking", 40_000),
        ]);
        assert!(pairs.is_empty());
        assert_eq!(regular.len(), 2);
    }

    #[test]
    fn test_unmatched_transfer_leg_stays_in_regular_flow() {
        let (pairs, regular) = detect_transfer_pairs(vec![
            transfer_leg("t1", "checking", "savings", -50_000),
            txn("t2", "SHELL OIL"),
        ]);
        assert!(pairs.is_empty());
        assert_eq!(regular.len(), 2);
        assert!(regular.iter().any(|t| t.id == "t1"));
    }

    #[test]
    fn test_fallback_suggestions_cover_whole_batch() {
        let out = fallback_suggestions(vec![txn("t1", "A"), txn("t2", "B")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.category == FALLBACK_CATEGORY));
        assert!(out.iter().all(|s| s.confidence == Confidence::Low));
    }
}
