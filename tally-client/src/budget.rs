//! Budget service client (YNAB-style REST API, bearer token).

use anyhow::{Context, Result as AnyResult};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{Category, Transaction};

use crate::error::{ClientError, Result};
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.ynab.com/v1";

/// Category groups the budget service uses for bookkeeping, never shown
/// to the user.
const INTERNAL_GROUPS: &[&str] = &["Internal Master Category", "Hidden Categories"];

/// Wire shape of one transaction from the service.
#[derive(Deserialize)]
struct TxnRecord {
    id: String,
    payee_name: Option<String>,
    amount: i64,
    date: NaiveDate,
    account_id: String,
    #[serde(default)]
    transfer_account_id: Option<String>,
    category_id: Option<String>,
    category_name: Option<String>,
    approved: bool,
    deleted: bool,
    #[serde(default)]
    subtransactions: Vec<serde_json::Value>,
}

/// A transaction needs a suggestion only when nobody has touched it yet:
/// unapproved, not deleted, not a split parent, and without a category.
fn is_candidate(t: &TxnRecord) -> bool {
    !t.approved && !t.deleted && t.subtransactions.is_empty() && t.category_id.is_none()
}

/// Resolve a category display name to its service id, case-insensitively.
/// Repeated calls with the same inputs give the same id, which keeps the
/// category PATCH safe to retry.
pub fn resolve_category_id<'a>(categories: &'a [Category], name: &str) -> Option<&'a str> {
    categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .map(|c| c.id.as_str())
}

pub struct BudgetClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    budget_id: String,
    policy: RetryPolicy,
}

impl BudgetClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        budget_id: impl Into<String>,
        policy: RetryPolicy,
    ) -> AnyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            budget_id: budget_id.into(),
            policy,
        })
    }

    /// All visible categories for the budget, flattened across groups.
    /// Internal and hidden groups are skipped, as are hidden/deleted
    /// categories within a group.
    pub async fn fetch_categories(&self) -> Result<Vec<Category>> {
        #[derive(Deserialize)]
        struct Resp {
            data: Data,
        }
        #[derive(Deserialize)]
        struct Data {
            category_groups: Vec<Group>,
        }
        #[derive(Deserialize)]
        struct Group {
            name: String,
            categories: Vec<Cat>,
        }
        #[derive(Deserialize)]
        struct Cat {
            id: String,
            name: String,
            hidden: bool,
            deleted: bool,
        }

        let url = format!("{}/budgets/{}/categories", self.base_url, self.budget_id);
        let resp: Resp = self.get_with_retry("budget service", &url, &[]).await?;

        let mut categories = Vec::new();
        for group in resp.data.category_groups {
            if INTERNAL_GROUPS.contains(&group.name.as_str()) {
                continue;
            }
            for cat in group.categories {
                if cat.hidden || cat.deleted {
                    continue;
                }
                categories.push(Category {
                    id: cat.id,
                    name: cat.name,
                });
            }
        }
        Ok(categories)
    }

    /// Transactions inside the lookback window that still have no category.
    /// Already-approved and deleted transactions are dropped, as are split
    /// parents.
    pub async fn fetch_uncategorized(&self, lookback_days: u32) -> Result<Vec<Transaction>> {
        #[derive(Deserialize)]
        struct Resp {
            data: Data,
        }
        #[derive(Deserialize)]
        struct Data {
            transactions: Vec<TxnRecord>,
        }

        let since = (Utc::now() - Duration::days(lookback_days as i64))
            .format("%Y-%m-%d")
            .to_string();
        let url = format!("{}/budgets/{}/transactions", self.base_url, self.budget_id);
        let resp: Resp = self
            .get_with_retry("budget service", &url, &[("since_date", since.as_str())])
            .await?;

        let transactions = resp
            .data
            .transactions
            .into_iter()
            .filter(is_candidate)
            .map(|t| Transaction {
                id: t.id,
                payee: t.payee_name.unwrap_or_else(|| "(no payee)".to_string()),
                amount: t.amount,
                date: t.date,
                category: t.category_name,
                account_id: t.account_id,
                transfer_account_id: t.transfer_account_id,
            })
            .collect();
        Ok(transactions)
    }

    /// Set a transaction's category by display name. The name must resolve
    /// against `categories` (fetched earlier in the same run); the PATCH
    /// itself is idempotent upstream, so retries are safe.
    pub async fn apply_category(
        &self,
        transaction_id: &str,
        category_name: &str,
        categories: &[Category],
    ) -> Result<()> {
        let category_id = resolve_category_id(categories, category_name)
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidCategory(category_name.to_string()))?;

        #[derive(Serialize)]
        struct Body {
            transaction: Patch,
        }
        #[derive(Serialize)]
        struct Patch {
            category_id: String,
        }

        let url = format!(
            "{}/budgets/{}/transactions/{}",
            self.base_url, self.budget_id, transaction_id
        );
        let body = Body {
            transaction: Patch { category_id },
        };

        let http = &self.http;
        let token = self.token.as_str();
        let url = url.as_str();
        let body = &body;
        with_retry(&self.policy, || async move {
            let resp = http
                .patch(url)
                .bearer_auth(token)
                .json(body)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(format!("{status} {text}"));
            }
            Ok(())
        })
        .await
        .map_err(|message| ClientError::ServiceUnavailable {
            service: "budget service",
            attempts: self.policy.max_attempts,
            message,
        })
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let http = &self.http;
        let token = self.token.as_str();
        with_retry(&self.policy, || async move {
            let resp = http
                .get(url)
                .bearer_auth(token)
                .query(query)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(format!("{status} {text}"));
            }
            resp.json::<T>().await.map_err(|e| e.to_string())
        })
        .await
        .map_err(|message| ClientError::ServiceUnavailable {
            service,
            attempts: self.policy.max_attempts,
            message,
        })
    }
}
