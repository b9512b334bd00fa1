//! Shell command driver
//!
//! Runs one configured command per entity. The entity is passed through the
//! environment:
//!
//! | Variable | Value |
//! |----------|-------|
//! | `DOCLEDGER_CATEGORY` | category name |
//! | `DOCLEDGER_ITEM` | item name |
//! | `DOCLEDGER_FILE` | root-relative file path |
//! | `DOCLEDGER_LINE` | 1-based line number |
//!
//! Exit 0 means documented, exit 3 asks for manual review, any other exit is
//! an error. stderr (or stdout when stderr is empty) becomes the reason.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::DocumentationDriver;
use crate::constants::driver::{MANUAL_REVIEW_EXIT_CODE, MAX_REASON_CHARS};
use crate::types::{LedgerError, ManifestEntry, Outcome, Result};

pub struct CommandDriver {
    command: String,
    working_dir: PathBuf,
}

impl CommandDriver {
    pub fn new(command: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

#[async_trait]
impl DocumentationDriver for CommandDriver {
    fn name(&self) -> &str {
        "command"
    }

    async fn document(&self, entry: &ManifestEntry) -> Result<Outcome> {
        let mut cmd = self.shell();
        cmd.current_dir(&self.working_dir)
            .env("DOCLEDGER_CATEGORY", &entry.category)
            .env("DOCLEDGER_ITEM", &entry.item_name)
            .env("DOCLEDGER_FILE", &entry.location.file_path)
            .env("DOCLEDGER_LINE", entry.location.line_number.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Timeouts and cancellation drop the future; take the child with it
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            LedgerError::driver(
                entry.key(),
                format!("failed to spawn '{}': {}", self.command, e),
            )
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LedgerError::driver(entry.key(), format!("driver command failed: {}", e)))?;

        debug!(
            "Driver command for {} exited with {:?}",
            entry.key(),
            output.status.code()
        );

        let reason = || {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let text = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            if text.is_empty() {
                match output.status.code() {
                    Some(code) => format!("driver exited with status {}", code),
                    None => "driver terminated by signal".to_string(),
                }
            } else {
                truncate_reason(&text)
            }
        };

        Ok(match output.status.code() {
            Some(0) => Outcome::Documented,
            Some(MANUAL_REVIEW_EXIT_CODE) => Outcome::ManualReview(reason()),
            _ => Outcome::Error(reason()),
        })
    }
}

/// Keep reasons to a readable size, cutting on a char boundary
pub fn truncate_reason(text: &str) -> String {
    match text.char_indices().nth(MAX_REASON_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
