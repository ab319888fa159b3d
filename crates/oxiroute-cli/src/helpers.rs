//! Shared CLI output helpers.

use colored::Colorize;

use oxiroute_providers::InitOutcome;

/// Print a section title.
pub fn print_title(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
    println!();
}

/// Print a model response to stdout.
pub fn print_response(label: &str, response: &str) {
    println!();
    println!("{}", label.cyan().bold());
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// One line per initialization outcome.
pub fn format_outcome(outcome: &InitOutcome) -> String {
    if outcome.success {
        format!("{} {}", "✓".green(), outcome.provider_id)
    } else {
        format!(
            "{} {} {}",
            "✗".red(),
            outcome.provider_id,
            outcome.error.as_deref().unwrap_or("unknown error").dimmed()
        )
    }
}

/// Label shown above a response, e.g. `openai:gpt-4o`.
pub fn model_label(provider_id: &str, model_id: &str) -> String {
    format!("{provider_id}:{model_id}")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
