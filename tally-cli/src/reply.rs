//! The approval path: parse a user reply, apply decisions to the budget
//! service, learn patterns, and report back into the thread.

use anyhow::{Context, Result};

use tally_client::{BudgetClient, ChannelClient};
use tally_core::{approval, format, StateStore};

use crate::auth;
use crate::config::Config;
use crate::home;

pub async fn handle_reply(config: &Config, text: &str) -> Result<()> {
    let mut store = StateStore::load(home::state_path()?)?;

    let Some(batch) = store.oldest_pending().cloned() else {
        println!("No pending batch; nothing to apply.");
        return Ok(());
    };

    let creds = auth::resolve_credentials()?;
    let policy = config.retry.policy();
    let chat = ChannelClient::new(
        &config.chat.base_url,
        &creds.chat_token,
        &config.chat.channel,
        policy,
    )?;

    let command = approval::parse_reply(text);

    // Skip and unrecognized replies touch no state; answer and stop.
    if command == approval::ReplyCommand::Skip {
        post_best_effort(&chat, &batch.id, "👍 Skipped. I'll check again tomorrow.").await;
        println!("Skipped; batch left pending.");
        return Ok(());
    }
    if command == approval::ReplyCommand::Unrecognized {
        let help = approval::help_message();
        post_best_effort(&chat, &batch.id, &help).await;
        println!("{help}");
        return Ok(());
    }

    let budget = BudgetClient::new(
        &config.budget.base_url,
        &creds.budget_token,
        &config.budget.budget_id,
        policy,
    )?;
    let categories = budget
        .fetch_categories()
        .await
        .context("fetching categories")?;
    let category_names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();

    let resolution = approval::resolve_reply(&command, &batch, &category_names);
    for w in &resolution.warnings {
        eprintln!("warning: {w}");
    }

    // Apply each decision independently; one failure doesn't abort the rest.
    // The applied name is resolved first so a stale suggestion degrades to
    // the fallback before it can be learned or reported.
    let mut lines = Vec::new();
    let mut failed_ids = Vec::new();
    let mut applied = 0usize;
    for (i, a) in resolution.approvals.iter().enumerate() {
        let (category, fell_back) = approval::final_category(&category_names, &a.category);
        if fell_back {
            eprintln!(
                "warning: category '{}' no longer exists; using {category}",
                a.category
            );
        }
        match budget
            .apply_category(&a.transaction.id, &category, &categories)
            .await
        {
            Ok(()) => {
                store.upsert_pattern(&a.transaction.payee, &category);
                applied += 1;
                lines.push(format::format_result_line(i + 1, &a.transaction.payee, &category, true));
            }
            Err(e) => {
                eprintln!("apply failed for {}: {e}", a.transaction.id);
                failed_ids.push(a.transaction.id.clone());
                lines.push(format::format_result_line(i + 1, &a.transaction.payee, &category, false));
            }
        }
    }

    if resolution.clear_batch {
        store.clear_pending(&batch.id);
    }
    store.save()?;

    let mut summary = format!(
        "*Updated {applied}/{} transaction(s):*\n\n{}",
        resolution.approvals.len(),
        lines.join("\n")
    );
    if !resolution.warnings.is_empty() {
        summary.push_str(&format!("\n\n_{} warning(s) — see logs._", resolution.warnings.len()));
    }
    post_best_effort(&chat, &batch.id, &summary).await;
    println!("{summary}");

    if !failed_ids.is_empty() {
        println!("Failed transaction ids: {}", failed_ids.join(", "));
    }
    Ok(())
}

/// The outcome summary is informational; state is already saved, so a post
/// failure only warns.
async fn post_best_effort(chat: &ChannelClient, thread_ts: &str, text: &str) {
    if let Err(e) = chat.post_reply(thread_ts, text).await {
        eprintln!("could not post to thread {thread_ts}: {e}");
    }
}
