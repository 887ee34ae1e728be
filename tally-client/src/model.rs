//! Categorization model client (OpenRouter chat completions).
//!
//! One logical operation: submit the unresolved transaction batch plus the
//! category vocabulary and learned patterns, get back one category and
//! confidence label per transaction. The response is JSON we asked for in
//! the prompt, so everything here is defensive about what actually comes
//! back.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use tally_core::{patterns, PatternBook, RawSuggestion, Transaction};

use crate::error::{ClientError, Result};
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl ModelClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        policy: RetryPolicy,
    ) -> AnyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            policy,
        })
    }

    /// Ask for one category + confidence per transaction. Transport failure
    /// after retries is `ServiceUnavailable`; an answer that doesn't parse
    /// per the expected schema is `MalformedModelResponse`. The caller
    /// degrades the whole batch to fallback either way.
    pub async fn suggest(
        &self,
        transactions: &[Transaction],
        valid_categories: &[String],
        learned: &PatternBook,
    ) -> Result<Vec<RawSuggestion>> {
        #[derive(Serialize)]
        struct Msg {
            role: String,
            content: String,
        }
        #[derive(Serialize)]
        struct Req {
            model: String,
            messages: Vec<Msg>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }
        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let prompt = build_prompt(transactions, valid_categories, learned);
        let body = Req {
            model: self.model.clone(),
            messages: vec![Msg {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let http = &self.http;
        let key = self.api_key.as_str();
        let url = url.as_str();
        let body = &body;
        let resp: Resp = with_retry(&self.policy, || async move {
            let resp = http
                .post(url)
                .bearer_auth(key)
                .json(body)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(format!("{status} {text}"));
            }
            resp.json::<Resp>().await.map_err(|e| e.to_string())
        })
        .await
        .map_err(|message| ClientError::ServiceUnavailable {
            service: "categorization model",
            attempts: self.policy.max_attempts,
            message,
        })?;

        let content = resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ClientError::MalformedModelResponse("response had no content".to_string())
            })?;

        parse_model_output(&content)
    }
}

/// Build the categorization prompt: vocabulary, learned patterns as
/// few-shot context, and the numbered transaction list.
pub fn build_prompt(
    transactions: &[Transaction],
    valid_categories: &[String],
    learned: &PatternBook,
) -> String {
    let category_list: Vec<String> = valid_categories.iter().map(|c| format!("- {c}")).collect();

    let txn_list: Vec<String> = transactions
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "{}. {} - {} on {}",
                i + 1,
                t.payee,
                t.amount_display(),
                t.date
            )
        })
        .collect();

    format!(
        "You are helping categorize personal finance transactions for a budget.\n\n\
         Available categories:\n{}\n\n\
         Previously learned patterns from user approvals:\n{}\n\n\
         Uncategorized transactions:\n{}\n\n\
         For each transaction, suggest the most appropriate category based on:\n\
         1. Previously learned patterns (highest priority - the user approved these before)\n\
         2. The merchant/payee name\n\
         3. Common transaction categorization logic\n\
         4. The transaction amount and date if relevant\n\n\
         Respond in JSON format with an array of objects, one per transaction:\n\
         [\n  {{\"transaction_number\": 1, \"category\": \"Category Name\", \"confidence\": \"high/medium/low\"}},\n  ...\n]\n\n\
         Be concise and accurate. Only use categories from the available list.",
        category_list.join("\n"),
        patterns::render_for_prompt(learned),
        txn_list.join("\n"),
    )
}

/// Parse the model's reply into suggestions, tolerating markdown code
/// fences around the JSON array.
pub fn parse_model_output(content: &str) -> Result<Vec<RawSuggestion>> {
    let json = strip_code_fences(content);
    serde_json::from_str(json.trim())
        .map_err(|e| ClientError::MalformedModelResponse(format!("{e}: {json}")))
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn txn(payee: &str) -> Transaction {
        Transaction {
            id: "t1".to_string(),
            payee: payee.to_string(),
            amount: -8_760,
            date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            category: None,
            account_id: "acct-1".to_string(),
            transfer_account_id: None,
        }
    }

    #[test]
    fn test_prompt_contains_vocabulary_patterns_and_numbering() {
        let mut book = PatternBook::new();
        book.upsert("wakaba sushi", "Dining");
        let prompt = build_prompt(
            &[txn("NEW CAFE"), txn("SOME SHOP")],
            &["Dining".to_string(), "Shopping".to_string()],
            &book,
        );
        assert!(prompt.contains("- Dining"));
        assert!(prompt.contains("- wakaba sushi: Dining"));
        assert!(prompt.contains("1. NEW CAFE - -$8.76 on 2026-08-25"));
        assert!(prompt.contains("2. SOME SHOP"));
        assert!(prompt.contains("transaction_number"));
    }

    #[test]
    fn test_parse_plain_json_array() {
        let out = parse_model_output(
            r#"[{"transaction_number": 1, "category": "Dining", "confidence": "high"}]"#,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "Dining");
        assert_eq!(out[0].confidence.as_deref(), Some("high"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n[{\"transaction_number\": 2, \"category\": \"Gas\"}]\n```";
        let out = parse_model_output(content).unwrap();
        assert_eq!(out[0].transaction_number, 2);
        assert_eq!(out[0].confidence, None);
    }

    #[test]
    fn test_parse_bare_fence() {
        let content = "```\n[{\"transaction_number\": 1, \"category\": \"Gas\"}]\n```";
        assert!(parse_model_output(content).is_ok());
    }

    #[test]
    fn test_malformed_output_is_detected() {
        let err = parse_model_output("Sure! The first one looks like groceries.").unwrap_err();
        assert!(matches!(err, ClientError::MalformedModelResponse(_)));
    }
}
