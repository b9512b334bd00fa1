use console::style;

use crate::types::EntryStatus;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    /// Status word colored by how far it is from documented
    pub fn status(&self, status: EntryStatus) -> String {
        let word = style(status.as_str());
        match status {
            EntryStatus::Documented => word.green(),
            EntryStatus::Pending => word.cyan(),
            EntryStatus::Error => word.red(),
            EntryStatus::ManualReview => word.yellow(),
        }
        .to_string()
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
