//! The scheduled categorization run: fetch → patterns → model → notify →
//! persist pending batch.

use anyhow::{Context, Result};
use chrono::Utc;

use tally_client::{BudgetClient, ChannelClient, ClientError, ModelClient};
use tally_core::{
    engine, format, store::PendingBatch, StateStore, Suggested,
};

use crate::auth;
use crate::config::Config;
use crate::home;

pub async fn run_pipeline(config: &Config, lookback_days: Option<u32>, dry_run: bool) -> Result<()> {
    let creds = auth::resolve_credentials()?;
    let policy = config.retry.policy();
    let lookback = lookback_days.unwrap_or(config.budget.lookback_days);

    let budget = BudgetClient::new(
        &config.budget.base_url,
        &creds.budget_token,
        &config.budget.budget_id,
        policy,
    )?;

    // Fetch failures abort the run with no side effects: nothing marked
    // processed, no state write. An empty fetch is not a failure.
    println!("Fetching categories...");
    let categories = budget
        .fetch_categories()
        .await
        .context("fetching categories")?;
    println!("  {} categories", categories.len());

    println!("Fetching uncategorized transactions ({lookback} day lookback)...");
    let fetched = budget
        .fetch_uncategorized(lookback)
        .await
        .context("fetching transactions")?;

    let mut store = StateStore::load(home::state_path()?)?;
    let transactions: Vec<_> = fetched
        .into_iter()
        .filter(|t| !store.is_processed(&t.id))
        .collect();
    println!("  {} new uncategorized transaction(s)", transactions.len());

    // Matched transfer pairs carry no spending to categorize; report them
    // and keep them away from patterns and the model.
    let (transfer_pairs, transactions) = engine::detect_transfer_pairs(transactions);
    if !transfer_pairs.is_empty() {
        println!("  {} transfer pair(s) detected", transfer_pairs.len());
    }

    if transfer_pairs.is_empty() && transactions.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }

    // Fetch order is what the user sees; remember it before partitioning.
    let fetch_order: Vec<String> = transactions.iter().map(|t| t.id.clone()).collect();

    let split = engine::split_by_patterns(store.patterns(), transactions);
    println!(
        "  {} resolved by learned patterns, {} for the model",
        split.resolved.len(),
        split.unresolved.len()
    );

    let category_names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
    let mut suggestions = split.resolved;
    suggestions.extend(
        suggest_remainder(config, &creds, split.unresolved, &category_names, &store).await,
    );
    sort_by_fetch_order(&mut suggestions, &fetch_order);

    let mut message = format::format_transfer_section(&transfer_pairs);
    if !suggestions.is_empty() {
        message.push_str(&format::format_batch_message(&suggestions));
    }

    if dry_run {
        println!("\n--- dry run: message not posted, state untouched ---\n");
        println!("{message}");
        return Ok(());
    }

    let chat = ChannelClient::new(
        &config.chat.base_url,
        &creds.chat_token,
        &config.chat.channel,
        policy,
    )?;

    println!("Posting to {}...", config.chat.channel);
    let created_at = Utc::now();
    let post_result = chat.post_message(&message).await;
    let batch_id = match &post_result {
        Ok(ts) => ts.clone(),
        // Keep the batch on a failed post so a retry doesn't re-fetch or
        // re-categorize; pair replies by trigger time instead.
        Err(_) => format!("run-{}", created_at.timestamp()),
    };

    for s in &suggestions {
        store.mark_processed(&s.transaction.id);
    }
    // Transfer legs are reported exactly once.
    for (a, b) in &transfer_pairs {
        store.mark_processed(&a.id);
        store.mark_processed(&b.id);
    }
    if !suggestions.is_empty() {
        store.push_pending(PendingBatch {
            id: batch_id.clone(),
            suggestions,
            created_at,
        });
    }
    store.save()?;

    match post_result {
        Ok(ts) => {
            println!("Posted batch {ts}; waiting for a reply.");
            Ok(())
        }
        Err(e) => {
            Err(anyhow::Error::new(e)
                .context(format!("batch {batch_id} persisted, but the post failed")))
        }
    }
}

/// Model pass for transactions no pattern matched. Any failure — missing
/// key, transport, malformed output — degrades the whole remainder to the
/// fallback category so the run still reaches the user.
async fn suggest_remainder(
    config: &Config,
    creds: &auth::Credentials,
    unresolved: Vec<tally_core::Transaction>,
    category_names: &[String],
    store: &StateStore,
) -> Vec<Suggested> {
    if unresolved.is_empty() {
        return Vec::new();
    }

    let Some(model_key) = creds.model_key.as_deref() else {
        eprintln!("No model API key; marking {} transaction(s) uncategorized", unresolved.len());
        return engine::fallback_suggestions(unresolved);
    };

    let model = match ModelClient::new(
        &config.model.base_url,
        model_key,
        &config.model.model,
        config.model.temperature,
        config.retry.policy(),
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Model client unavailable ({e}); falling back");
            return engine::fallback_suggestions(unresolved);
        }
    };

    println!("Asking {} about {} transaction(s)...", config.model.model, unresolved.len());
    match model
        .suggest(&unresolved, category_names, store.patterns())
        .await
    {
        Ok(raw) => engine::validate_suggestions(category_names, unresolved, &raw),
        Err(e @ ClientError::MalformedModelResponse(_)) => {
            eprintln!("{e}; falling back to Uncategorized");
            engine::fallback_suggestions(unresolved)
        }
        Err(e) => {
            eprintln!("Model call failed ({e}); falling back to Uncategorized");
            engine::fallback_suggestions(unresolved)
        }
    }
}

fn sort_by_fetch_order(suggestions: &mut [Suggested], fetch_order: &[String]) {
    let position = |id: &str| {
        fetch_order
            .iter()
            .position(|o| o == id)
            .unwrap_or(usize::MAX)
    };
    suggestions.sort_by_key(|s| position(&s.transaction.id));
}
