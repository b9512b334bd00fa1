//! Entry Commands
//!
//! Inspect and correct individual manifest entries by hand. Every change is
//! recorded as an operator event.

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, parse_identity};
use crate::storage::Actor;
use crate::types::{EntryStatus, LedgerError, Location, Outcome, Result};

/// List entries of one category with the given status, in discovery order
pub fn list(category: &str, status: EntryStatus, limit: Option<usize>, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let mut entries = ctx.tracker.store().list_by_status(category, status)?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No {} entries in '{}'.", status, category);
        return Ok(());
    }
    for entry in &entries {
        match &entry.reason {
            Some(reason) => println!("{}  {}  ({})", entry.item_name, entry.location, reason),
            None => println!("{}  {}", entry.item_name, entry.location),
        }
    }
    Ok(())
}

/// Record an outcome for a pending entry by hand
pub fn mark(
    category: &str,
    name: &str,
    location: &str,
    status: EntryStatus,
    reason: Option<String>,
) -> Result<()> {
    let key = parse_identity(category, name, location)?;
    if status.requires_reason() && reason.as_deref().is_none_or(|r| r.trim().is_empty()) {
        return Err(LedgerError::Config(format!(
            "Status '{}' needs --reason",
            status
        )));
    }
    let outcome = Outcome::from_status(status, reason).ok_or_else(|| {
        LedgerError::Config("Use 'docledger requeue' to return an entry to pending".to_string())
    })?;

    let ctx = CommandContext::load()?;
    let entry = ctx
        .tracker
        .store()
        .report_result(&key, &outcome, Actor::Operator)?;

    Output::new().success(&format!(
        "{} is now {}",
        entry.key(),
        Output::new().status(entry.status)
    ));
    Ok(())
}

/// Return an error or manual-review entry to pending
pub fn requeue(category: &str, name: &str, location: &str) -> Result<()> {
    let key = parse_identity(category, name, location)?;
    let ctx = CommandContext::load()?;
    let entry = ctx.tracker.store().requeue(&key)?;
    Output::new().success(&format!("{} requeued", entry.key()));
    Ok(())
}

pub fn remove(category: &str, name: &str, location: &str) -> Result<()> {
    let key = parse_identity(category, name, location)?;
    let ctx = CommandContext::load()?;
    let entry = ctx.tracker.store().remove(&key)?;
    Output::new().success(&format!("Removed {} ({})", entry.key(), entry.status));
    Ok(())
}

/// Carry an entry's status over to a new name or location
pub fn rename(
    category: &str,
    name: &str,
    location: &str,
    new_name: Option<&str>,
    new_location: Option<&str>,
) -> Result<()> {
    let key = parse_identity(category, name, location)?;
    let new_location = new_location
        .map(|loc| {
            Location::parse(loc).ok_or_else(|| {
                LedgerError::Config(format!("Invalid location '{}': expected <file>:<line>", loc))
            })
        })
        .transpose()?;
    if new_name.is_none() && new_location.is_none() {
        return Err(LedgerError::Config(
            "Nothing to rename: pass --to-name and/or --to-location".to_string(),
        ));
    }

    let ctx = CommandContext::load()?;
    let entry = ctx.tracker.store().rename(&key, new_name, new_location)?;
    Output::new().success(&format!("{} -> {} ({})", key, entry.key(), entry.status));
    Ok(())
}

/// Status transitions recorded for one entry
pub fn events(category: &str, name: &str, location: &str, format: &str) -> Result<()> {
    let key = parse_identity(category, name, location)?;
    let ctx = CommandContext::load()?;
    let entry = ctx.tracker.store().get(&key)?;
    let events = ctx.tracker.store().events(&key)?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "entry": entry,
                "events": events,
            }))?
        );
        return Ok(());
    }

    let out = Output::new();
    println!("{}  {}", entry.key(), out.status(entry.status));
    for event in &events {
        let from = event
            .from
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let to = event
            .to
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<8}  {} -> {}{}",
            event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            event.actor,
            from,
            to,
            event
                .reason
                .as_ref()
                .map(|r| format!("  ({})", r))
                .unwrap_or_default()
        );
    }
    Ok(())
}
