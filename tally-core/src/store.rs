//! File-backed agent state: processed ids, learned patterns, pending batches.
//!
//! The store exclusively owns the persisted structures; the engine and the
//! approval path go through its operations instead of touching the file.
//! Saves are atomic (temp file + rename in the same directory) so a writer
//! that dies mid-save never leaves a corrupt state file behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::patterns::PatternBook;
use crate::transaction::Suggested;

/// A batch of suggestions posted to the channel and awaiting a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    /// Chat message timestamp when the post succeeded, otherwise the
    /// trigger time. Used to pair replies with batches.
    pub id: String,
    pub suggestions: Vec<Suggested>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Ids already shown to the user in some batch. Grows monotonically.
    pub processed_transactions: BTreeSet<String>,
    pub category_patterns: PatternBook,
    #[serde(default)]
    pub pending_batches: Vec<PendingBatch>,
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: AgentState,
}

impl StateStore {
    /// Load state from `path`, or start empty if the file doesn't exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let s = fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&s)
                .with_context(|| format!("parse {}", path.display()))?
        } else {
            AgentState::default()
        };
        Ok(Self { path, state })
    }

    /// Write state atomically: serialize to a sibling temp file, then rename.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename into {}", self.path.display()))?;
        Ok(())
    }

    pub fn is_processed(&self, transaction_id: &str) -> bool {
        self.state.processed_transactions.contains(transaction_id)
    }

    pub fn mark_processed(&mut self, transaction_id: &str) {
        self.state
            .processed_transactions
            .insert(transaction_id.to_string());
    }

    pub fn processed_count(&self) -> usize {
        self.state.processed_transactions.len()
    }

    pub fn patterns(&self) -> &PatternBook {
        &self.state.category_patterns
    }

    pub fn match_pattern(&self, payee: &str) -> Option<&str> {
        self.state.category_patterns.lookup(payee)
    }

    pub fn upsert_pattern(&mut self, payee: &str, category: &str) {
        self.state.category_patterns.upsert(payee, category);
    }

    pub fn push_pending(&mut self, batch: PendingBatch) {
        self.state.pending_batches.push(batch);
    }

    /// The batch a reply should resolve against. Oldest first when several
    /// are outstanding.
    pub fn oldest_pending(&self) -> Option<&PendingBatch> {
        self.state
            .pending_batches
            .iter()
            .min_by_key(|b| b.created_at)
    }

    /// Remove one resolved batch by id.
    pub fn clear_pending(&mut self, batch_id: &str) {
        self.state.pending_batches.retain(|b| b.id != batch_id);
    }

    pub fn pending_batches(&self) -> &[PendingBatch] {
        &self.state.pending_batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Confidence, Transaction};
    use chrono::NaiveDate;

    fn suggested(id: &str, payee: &str, category: &str) -> Suggested {
        Suggested {
            transaction: Transaction {
                id: id.to_string(),
                payee: payee.to_string(),
                amount: -12_340,
                date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
                category: None,
                account_id: "acct-1".to_string(),
                transfer_account_id: None,
            },
            category: category.to_string(),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        store.mark_processed("txn-b");
        store.mark_processed("txn-a");
        store.upsert_pattern("Whole Foods Market", "Groceries");
        store.upsert_pattern("Shell Oil #42", "Gas");
        store.push_pending(PendingBatch {
            id: "1724900000.000100".to_string(),
            suggestions: vec![suggested("txn-c", "WAKABA SUSHI", "Dining")],
            created_at: Utc::now(),
        });
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert!(reloaded.is_processed("txn-a"));
        assert!(reloaded.is_processed("txn-b"));
        assert!(!reloaded.is_processed("txn-c"));
        // Pattern order survives the round trip.
        let merchants: Vec<&str> = reloaded
            .patterns()
            .entries()
            .iter()
            .map(|e| e.merchant.as_str())
            .collect();
        assert_eq!(merchants, vec!["whole foods market", "shell oil"]);
        assert_eq!(reloaded.pending_batches().len(), 1);
        assert_eq!(reloaded.pending_batches()[0].suggestions[0].category, "Dining");
    }

    #[test]
    fn test_oldest_pending_wins_tie_break() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StateStore::load(dir.path().join("state.json")).unwrap();
        let t0 = Utc::now();
        store.push_pending(PendingBatch {
            id: "newer".to_string(),
            suggestions: vec![],
            created_at: t0 + chrono::Duration::hours(1),
        });
        store.push_pending(PendingBatch {
            id: "older".to_string(),
            suggestions: vec![],
            created_at: t0,
        });
        assert_eq!(store.oldest_pending().unwrap().id, "older");
        store.clear_pending("older");
        assert_eq!(store.oldest_pending().unwrap().id, "newer");
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.processed_count(), 0);
        assert!(store.oldest_pending().is_none());
    }
}
