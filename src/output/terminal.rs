// Colored terminal output for verdicts, decisions, and scan summaries.
//
// main.rs display functions delegate here.

use colored::Colorize;

use crate::classify::Verdict;
use crate::enforcement::Action;
use crate::moderator::{ModerationOutcome, ScanSummary};

/// Display a single verdict in the terminal.
pub fn display_verdict(text: &str, verdict: &Verdict) {
    println!("\n{}", "=== Analysis ===".bold());
    println!("  Message: {}", super::truncate_chars(text, 120).dimmed());

    let status = if verdict.violation {
        "VIOLATION".red().bold()
    } else {
        "ok".green()
    };
    println!("  Result: {}", status);
    println!("  Type: {}", colorize_kind(verdict));
    println!(
        "  Severity: {}  Confidence: {:.2}",
        colorize_severity(verdict.severity),
        verdict.confidence
    );
    println!("  Reason: {}", verdict.reason);

    if !verdict.details.is_null() {
        if let Ok(details) = serde_json::to_string(&verdict.details) {
            println!("  Details: {}", super::truncate_chars(&details, 200).dimmed());
        }
    }
}

/// Display one line per handled message.
pub fn display_outcome(outcome: &ModerationOutcome) {
    let Some(verdict) = &outcome.verdict else {
        println!("  user {:<20} {}", outcome.subject_id, "skipped".dimmed());
        return;
    };

    match outcome.action {
        Some(action) => {
            let timeout = outcome
                .timeout
                .map(|d| format!(" ({} min)", d.as_secs() / 60))
                .unwrap_or_default();
            println!(
                "  user {:<20} {:<8}{}  {:<14} sev {:.2}  warnings {}",
                outcome.subject_id,
                colorize_action(action),
                timeout,
                verdict.kind.as_str(),
                verdict.severity,
                outcome.warning_count,
            );
        }
        None => {
            println!(
                "  user {:<20} {:<8}  {}",
                outcome.subject_id,
                "clean".green(),
                verdict.kind.as_str().dimmed(),
            );
        }
    }
}

/// Display the aggregate result of a bulk scan.
pub fn display_scan_summary(summary: &ScanSummary) {
    println!(
        "\n{}",
        format!(
            "=== Scanned {} messages, {} violations ===",
            summary.checked, summary.violations
        )
        .bold()
    );

    if summary.skipped > 0 {
        println!(
            "  {} {} messages beyond the scan limit were ignored",
            "~".yellow(),
            summary.skipped
        );
    }

    for (action, count) in &summary.actions {
        println!("  {:<10} {}", action, count);
    }
    if !summary.types.is_empty() {
        println!("\n  By type:");
        for (kind, count) in &summary.types {
            println!("    {:<16} {}", kind, count);
        }
    }
}

/// Display the blocklist, one entry per line.
pub fn display_blocked_words(words: &[String]) {
    if words.is_empty() {
        println!("Blocklist is empty. Add entries with `modwarden blockword add`.");
        return;
    }
    println!("\n{}", format!("=== Blocked words ({}) ===", words.len()).bold());
    for word in words {
        println!("  {}", word);
    }
}

fn colorize_kind(verdict: &Verdict) -> colored::ColoredString {
    let tag = verdict.kind.as_str();
    if verdict.violation {
        tag.red()
    } else {
        tag.dimmed()
    }
}

fn colorize_severity(severity: f64) -> colored::ColoredString {
    let text = format!("{:.2}", severity);
    if severity >= 0.9 {
        text.red().bold()
    } else if severity >= 0.7 {
        text.bright_red()
    } else if severity >= 0.3 {
        text.yellow()
    } else {
        text.green()
    }
}

fn colorize_action(action: Action) -> colored::ColoredString {
    match action {
        Action::Ban => "ban".red().bold(),
        Action::Timeout => "timeout".bright_red(),
        Action::Warn => "warn".yellow(),
    }
}
