use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

use crate::home::ensure_tally_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub budget_token: Option<String>,
    pub chat_token: Option<String>,
    pub model_key: Option<String>,
}

fn auth_path() -> Result<std::path::PathBuf> {
    Ok(ensure_tally_home()?.join("auth.json"))
}

pub fn load_auth() -> Result<AuthState> {
    let p = auth_path()?;
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(serde_json::from_str(&s)?)
}

pub fn save_auth(auth: &AuthState) -> Result<()> {
    let p = auth_path()?;
    let s = serde_json::to_string_pretty(auth)?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Resolved credentials for a run. Environment variables win over the
/// pasted store, matching how the scheduled deployment injects secrets.
pub struct Credentials {
    pub budget_token: String,
    pub chat_token: String,
    pub model_key: Option<String>,
}

pub fn resolve_credentials() -> Result<Credentials> {
    let auth = load_auth()?;
    let budget_token = std::env::var("YNAB_API_TOKEN")
        .ok()
        .or(auth.budget_token)
        .context("no budget token; set YNAB_API_TOKEN or run: tally auth paste-budget-token")?;
    let chat_token = std::env::var("SLACK_BOT_TOKEN")
        .ok()
        .or(auth.chat_token)
        .context("no chat token; set SLACK_BOT_TOKEN or run: tally auth paste-chat-token")?;
    let model_key = std::env::var("OPENROUTER_API_KEY").ok().or(auth.model_key);
    Ok(Credentials {
        budget_token,
        chat_token,
        model_key,
    })
}

fn prompt_secret(label: &str) -> Result<String> {
    // Minimal portable secret prompt: just stdin.
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn paste_budget_token() -> Result<()> {
    let mut auth = load_auth()?;
    let token = prompt_secret("Paste budget service token")?;
    if token.is_empty() {
        bail!("empty token");
    }
    auth.budget_token = Some(token);
    save_auth(&auth)?;
    println!("Saved budget token to ~/.tally/auth.json");
    Ok(())
}

pub fn paste_chat_token() -> Result<()> {
    let mut auth = load_auth()?;
    let token = prompt_secret("Paste chat bot token (starts with xoxb-)")?;
    if !token.starts_with("xoxb-") {
        bail!("token didn't look like a bot token (expected prefix xoxb-)");
    }
    auth.chat_token = Some(token);
    save_auth(&auth)?;
    println!("Saved chat token to ~/.tally/auth.json");
    Ok(())
}

pub fn paste_model_key() -> Result<()> {
    let mut auth = load_auth()?;
    let key = prompt_secret("Paste model API key (starts with sk-)")?;
    if !key.starts_with("sk-") {
        bail!("key didn't look like an API key (expected prefix sk-)");
    }
    auth.model_key = Some(key);
    save_auth(&auth)?;
    println!("Saved model API key to ~/.tally/auth.json");
    Ok(())
}
