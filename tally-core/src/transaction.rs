//! Transaction and category types as the budget service reports them

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category name assigned when nothing better resolves.
pub const FALLBACK_CATEGORY: &str = "Uncategorized";

/// A transaction fetched from the budget service.
///
/// Amounts are signed milliunits (the budget service's convention:
/// -4_500_000 is a $4,500.00 outflow). We never rescale or flip sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable identifier, unique across fetches
    pub id: String,
    /// Payee/merchant free text
    pub payee: String,
    /// Signed milliunits
    pub amount: i64,
    pub date: NaiveDate,
    /// Category currently set upstream, if any. `None` is the
    /// categorization trigger.
    pub category: Option<String>,
    /// Account holding the transaction
    #[serde(default)]
    pub account_id: String,
    /// The other account when this is one leg of an account-to-account
    /// transfer
    #[serde(default)]
    pub transfer_account_id: Option<String>,
}

impl Transaction {
    /// Render the amount as a signed dollar string ("-$12.50").
    pub fn amount_display(&self) -> String {
        let dollars = self.amount.abs() as f64 / 1000.0;
        if self.amount < 0 {
            format!("-${dollars:.2}")
        } else {
            format!("${dollars:.2}")
        }
    }
}

/// A budget category. The set is enumerated per budget; every suggestion
/// must resolve to a member of this set or [`FALLBACK_CATEGORY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Whether a suggestion came from a learned pattern, the model, or a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
}

impl Confidence {
    pub fn marker(&self) -> &'static str {
        match self {
            Confidence::High => "🟢",
            Confidence::Medium => "🟡",
            Confidence::Low => "🔴",
        }
    }

    /// Parse the model's free-text label; anything unexpected reads as Medium.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }
}

/// A transaction paired with its suggested category, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggested {
    pub transaction: Transaction,
    pub category: String,
    pub confidence: Confidence,
}
