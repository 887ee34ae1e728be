//! End-to-end exercise of the suggest → notify → reply → learn cycle using
//! the state store on disk and a recording stand-in for the budget service.

use chrono::{NaiveDate, Utc};
use tally_core::{
    parse_reply, resolve_reply, split_by_patterns, PendingBatch, ReplyCommand, StateStore,
    Suggested, Transaction,
};

fn txn(id: &str, payee: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        payee: payee.to_string(),
        amount: -42_000,
        date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
        category: None,
        account_id: "acct-1".to_string(),
        transfer_account_id: None,
    }
}

fn vocab() -> Vec<String> {
    vec![
        "Groceries".to_string(),
        "Dining".to_string(),
        "Gas".to_string(),
        "Uncategorized".to_string(),
    ]
}

fn batch_of(suggestions: Vec<Suggested>) -> PendingBatch {
    PendingBatch {
        id: "1724900000.000100".to_string(),
        suggestions,
        created_at: Utc::now(),
    }
}

/// Approving a correction teaches a pattern that short-circuits the model
/// on the next run for the same merchant.
#[test]
fn test_override_teaches_pattern_for_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = StateStore::load(dir.path().join("state.json")).unwrap();

    // First run: nothing learned, the merchant would go to the model.
    let split = split_by_patterns(store.patterns(), vec![txn("t1", "WAKABA SUSHI #204")]);
    assert_eq!(split.unresolved.len(), 1);

    // The user corrects the suggestion to Dining.
    let batch = batch_of(vec![Suggested {
        transaction: txn("t1", "WAKABA SUSHI #204"),
        category: "Groceries".to_string(),
        confidence: tally_core::Confidence::Medium,
    }]);
    let command = parse_reply("1: Dining");
    let res = resolve_reply(&command, &batch, &vocab());
    assert_eq!(res.approvals.len(), 1);
    assert_eq!(res.approvals[0].category, "Dining");

    // Apply step: learn the pattern and persist.
    for a in &res.approvals {
        store.upsert_pattern(&a.transaction.payee, &a.category);
        store.mark_processed(&a.transaction.id);
    }
    store.save().unwrap();

    // Second run, fresh process: the merchant resolves without the model.
    let store = StateStore::load(dir.path().join("state.json")).unwrap();
    assert_eq!(store.match_pattern("WAKABA SUSHI #17 DALLAS"), Some("Dining"));
    let split = split_by_patterns(store.patterns(), vec![txn("t2", "WAKABA SUSHI #17 DALLAS")]);
    assert!(split.unresolved.is_empty());
    assert_eq!(split.resolved[0].category, "Dining");
}

/// `approve all` on a batch of N yields exactly N assignments at the
/// suggested categories, and the batch clears.
#[test]
fn test_approve_all_applies_every_suggestion_once() {
    let batch = batch_of(vec![
        Suggested {
            transaction: txn("t1", "HEB #0452"),
            category: "Groceries".to_string(),
            confidence: tally_core::Confidence::High,
        },
        Suggested {
            transaction: txn("t2", "SHELL OIL"),
            category: "Gas".to_string(),
            confidence: tally_core::Confidence::Medium,
        },
        Suggested {
            transaction: txn("t3", "WAKABA"),
            category: "Dining".to_string(),
            confidence: tally_core::Confidence::Low,
        },
    ]);

    let res = resolve_reply(&parse_reply("approve all"), &batch, &vocab());
    assert_eq!(res.approvals.len(), 3);
    assert!(res.clear_batch);

    let categories: Vec<&str> = res.approvals.iter().map(|a| a.category.as_str()).collect();
    assert_eq!(categories, vec!["Groceries", "Gas", "Dining"]);
}

/// `skip` defers: batch untouched in the store, zero assignments.
#[test]
fn test_skip_leaves_pending_batch_in_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = StateStore::load(dir.path().join("state.json")).unwrap();
    let batch = batch_of(vec![Suggested {
        transaction: txn("t1", "HEB"),
        category: "Groceries".to_string(),
        confidence: tally_core::Confidence::High,
    }]);
    store.push_pending(batch.clone());
    store.save().unwrap();

    let res = resolve_reply(&parse_reply("skip"), &batch, &vocab());
    assert!(res.approvals.is_empty());
    assert!(!res.clear_batch);

    // Nothing cleared; the batch is still there next cycle.
    let store = StateStore::load(dir.path().join("state.json")).unwrap();
    assert_eq!(store.pending_batches().len(), 1);
}

/// Unknown reply text parses to Unrecognized and resolves to a help-only
/// outcome with no approvals.
#[test]
fn test_unrecognized_reply_is_a_no_op() {
    let batch = batch_of(vec![Suggested {
        transaction: txn("t1", "HEB"),
        category: "Groceries".to_string(),
        confidence: tally_core::Confidence::High,
    }]);
    let command = parse_reply("please do the thing");
    assert_eq!(command, ReplyCommand::Unrecognized);
    let res = resolve_reply(&command, &batch, &vocab());
    assert!(res.approvals.is_empty());
    assert!(!res.clear_batch);
    assert!(res.help_requested);
}
