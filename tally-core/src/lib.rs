//! tally-core: domain logic for the budget categorization agent.
//!
//! Everything here is pure or file-local: transaction types, the persisted
//! state store, merchant pattern matching, model-output validation, the
//! approval-reply grammar, and batch message formatting. Remote calls live
//! in `tally-client`; wiring lives in `tally-cli`.

pub mod approval;
pub mod engine;
pub mod format;
pub mod patterns;
pub mod store;
pub mod transaction;

pub use approval::{parse_reply, resolve_reply, Approval, ReplyCommand, Resolution};
pub use engine::{
    detect_transfer_pairs, fallback_suggestions, split_by_patterns, validate_suggestions,
    RawSuggestion,
};
pub use patterns::{normalize_merchant, PatternBook, PatternEntry};
pub use store::{AgentState, PendingBatch, StateStore};
pub use transaction::{Category, Confidence, Suggested, Transaction, FALLBACK_CATEGORY};
