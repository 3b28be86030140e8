//! Terminal output helpers.

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", "!".yellow().bold(), message.yellow());
    }

    pub fn status(&self, message: &str) {
        println!("{}", message.dimmed());
    }

    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
    }

    /// Aligned `key: value` line.
    pub fn kv(&self, key: &str, value: &str) {
        println!("  {:<18} {}", format!("{key}:").bright_black(), value);
    }
}
