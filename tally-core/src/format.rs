//! Render a suggestion batch as a single chat message.

use crate::transaction::{Suggested, Transaction};

/// Emoji table keyed on lowercased category-name substrings. First hit wins;
/// unknown categories get the default card.
const EMOJI_TABLE: &[(&str, &str)] = &[
    ("groceries", "🛒"),
    ("grocery", "🛒"),
    ("dining", "🍽️"),
    ("restaurant", "🍽️"),
    ("food", "🍽️"),
    ("gas", "⛽"),
    ("fuel", "⛽"),
    ("coffee", "☕"),
    ("shopping", "🛍️"),
    ("entertainment", "🎬"),
    ("utilities", "💡"),
    ("rent", "🏠"),
    ("housing", "🏠"),
    ("mortgage", "🏠"),
    ("transportation", "🚗"),
    ("transit", "🚇"),
    ("health", "🏥"),
    ("medical", "🏥"),
    ("fitness", "💪"),
    ("gym", "💪"),
    ("subscriptions", "📱"),
    ("insurance", "🛡️"),
    ("gifts", "🎁"),
    ("travel", "✈️"),
    ("clothing", "👕"),
    ("personal", "👤"),
    ("pets", "🐾"),
    ("education", "📚"),
    ("income", "💰"),
    ("savings", "🏦"),
];

const DEFAULT_EMOJI: &str = "💳";

pub fn category_emoji(category: &str) -> &'static str {
    let lower = category.to_lowercase();
    EMOJI_TABLE
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, emoji)| *emoji)
        .unwrap_or(DEFAULT_EMOJI)
}

/// Build the full batch message: a 1-indexed transaction list (order as
/// fetched) followed by the fixed reply instructions.
pub fn format_batch_message(suggestions: &[Suggested]) -> String {
    let mut out = format!(
        "📋 *You have {} uncategorized transaction(s):*\n\n",
        suggestions.len()
    );

    for (i, s) in suggestions.iter().enumerate() {
        let txn = &s.transaction;
        out.push_str(&format!(
            "{}. {} *{}* - {}\n   → {} {}\n   _{}_\n\n",
            i + 1,
            category_emoji(&s.category),
            txn.payee,
            txn.amount_display(),
            s.category,
            s.confidence.marker(),
            txn.date,
        ));
    }

    out.push_str(
        "\n*To approve:*\n\
         • Reply `approve all` to categorize everything\n\
         • Reply `approve 1,3,5` to approve specific numbers\n\
         • Reply `1: Groceries` to change category for transaction 1\n\
         • Reply `skip` to ignore for now\n",
    );

    out
}

/// Informational section for detected account-to-account transfer pairs.
/// Empty input renders nothing; these need no approval, the user just
/// shouldn't wonder where the two legs went.
pub fn format_transfer_section(pairs: &[(Transaction, Transaction)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let mut out = format!("🔄 *Found {} matching transfer pair(s):*\n", pairs.len());
    for (a, b) in pairs {
        out.push_str(&format!(
            "• ${:.2} on {} - {} ↔ {}\n",
            a.amount.abs() as f64 / 1000.0,
            a.date,
            a.payee,
            b.payee,
        ));
    }
    out.push('\n');
    out
}

/// Per-transaction outcome line for the post-approval summary.
pub fn format_result_line(index: usize, payee: &str, category: &str, ok: bool) -> String {
    if ok {
        format!("✅ {index}. {payee} → {category}")
    } else {
        format!("❌ {index}. {payee} (failed)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Confidence, Transaction};
    use chrono::NaiveDate;

    fn suggested(payee: &str, category: &str, confidence: Confidence) -> Suggested {
        Suggested {
            transaction: Transaction {
                id: "t1".to_string(),
                payee: payee.to_string(),
                amount: -23_450,
                date: NaiveDate::from_ymd_opt(2026, 8, 23).unwrap(),
                category: None,
                account_id: "acct-1".to_string(),
                transfer_account_id: None,
            },
            category: category.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_emoji_substring_and_default() {
        assert_eq!(category_emoji("Groceries"), "🛒");
        assert_eq!(category_emoji("Dining Out"), "🍽️");
        assert_eq!(category_emoji("Monthly Savings"), "🏦");
        assert_eq!(category_emoji("Mystery"), "💳");
    }

    #[test]
    fn test_transfer_section_lists_both_legs() {
        let mut a = suggested("Transfer : Savings", "x", Confidence::High).transaction;
        a.amount = -50_000;
        let mut b = a.clone();
        b.payee = "Transfer : Checking".to_string();
        b.amount = 50_000;

        let section = format_transfer_section(&[(a, b)]);
        assert!(section.starts_with("🔄 *Found 1 matching transfer pair(s):*"));
        assert!(section.contains("• $50.00 on 2026-08-23 - Transfer : Savings ↔ Transfer : Checking"));
        assert_eq!(format_transfer_section(&[]), "");
    }

    #[test]
    fn test_message_layout() {
        let msg = format_batch_message(&[
            suggested("WAKABA SUSHI", "Dining Out", Confidence::High),
            suggested("NEW PLACE", "Uncategorized", Confidence::Low),
        ]);
        assert!(msg.starts_with("📋 *You have 2 uncategorized transaction(s):*"));
        assert!(msg.contains("1. 🍽️ *WAKABA SUSHI* - -$23.45"));
        assert!(msg.contains("→ Dining Out 🟢"));
        assert!(msg.contains("2. 💳 *NEW PLACE*"));
        assert!(msg.contains("→ Uncategorized 🔴"));
        assert!(msg.contains("_2026-08-23_"));
        assert!(msg.contains("Reply `approve all`"));
        assert!(msg.contains("Reply `skip`"));
    }
}
