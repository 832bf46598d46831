use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use modwarden::classify::openai::OpenAiClient;
use modwarden::classify::traits::OfflineClassifier;
use modwarden::classify::{BlockedWordSet, ClassificationPipeline, CompletionClient, ModerationClient};
use modwarden::config::Config;
use modwarden::moderator::{Moderator, MAX_SCAN_MESSAGES};
use modwarden::output::terminal;
use modwarden::store::{BlocklistStore, JsonBlocklistStore};

/// Modwarden: layered content moderation for chat communities.
///
/// Classifies messages through a blocklist, an external moderation model,
/// a nuanced LLM review, and local heuristics, then decides whether to
/// warn, time out, or ban based on each user's history.
#[derive(Parser)]
#[command(name = "modwarden", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single message and print the verdict
    Analyze {
        /// The message text
        text: String,
    },

    /// Run the violation handler over a file of messages
    Scan {
        /// File with one `subject_id<TAB>text` message per line
        file: PathBuf,

        /// Scope (community) the messages belong to
        #[arg(long, default_value = "0")]
        scope: u64,

        /// Number of messages to classify in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Manage the blocked word list
    Blockword {
        #[command(subcommand)]
        action: BlockwordAction,
    },

    /// Show current thresholds, limits, and escalation settings
    Status,
}

#[derive(Subcommand)]
enum BlockwordAction {
    /// Add one word or phrase
    Add { word: String },

    /// Add several entries separated by newlines, commas, or semicolons
    AddMany { list: String },

    /// Remove one word or phrase
    Remove { word: String },

    /// List all blocked entries
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("modwarden=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze { text } => {
            let moderator = build_moderator(&config)?;
            let verdict = moderator.pipeline().classify(&text).await;
            terminal::display_verdict(&text, &verdict);
        }

        Commands::Scan {
            file,
            scope,
            concurrency,
        } => {
            let moderator = build_moderator(&config)?;
            let messages = read_messages(&file)?;
            if messages.is_empty() {
                println!("No messages found in {}", file.display());
                return Ok(());
            }

            let total = messages.len().min(MAX_SCAN_MESSAGES);
            println!("Scanning {} messages...", total);

            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  Scanning [{bar:30}] {pos}/{len} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let report = moderator
                .scan(scope, messages, concurrency, Some(&pb))
                .await;
            pb.finish_and_clear();

            for outcome in &report.outcomes {
                terminal::display_outcome(outcome);
            }
            terminal::display_scan_summary(&report.summary);
        }

        Commands::Blockword { action } => {
            let moderator = build_moderator(&config)?;
            let pipeline = moderator.pipeline();
            match action {
                BlockwordAction::Add { word } => {
                    report_blocklist_update(pipeline.add_blocked_words([word.as_str()]), &word);
                }
                BlockwordAction::AddMany { list } => {
                    report_blocklist_update(pipeline.add_blocked_word_list(&list), &list);
                }
                BlockwordAction::Remove { word } => {
                    if pipeline.remove_blocked_word(&word) {
                        println!("Removed \"{}\" from the blocklist", word.trim());
                    } else {
                        println!("{}", "Could not update the blocklist".red());
                    }
                }
                BlockwordAction::List => {
                    terminal::display_blocked_words(&pipeline.blocked_words());
                }
            }
        }

        Commands::Status => {
            let moderator = build_moderator(&config)?;
            modwarden::status::show(&moderator, &config);
        }
    }

    Ok(())
}

fn report_blocklist_update(saved: bool, input: &str) {
    if saved {
        println!("Blocklist updated");
    } else {
        println!(
            "{} (input: \"{}\")",
            "Could not update the blocklist".red(),
            modwarden::output::truncate_chars(input, 60)
        );
    }
}

/// Wire up classifiers, blocklist, and enforcement from config.
fn build_moderator(config: &Config) -> Result<Moderator> {
    let (moderation, completion) = create_classifiers(config)?;

    let store = JsonBlocklistStore::new(&config.blocked_words_path);
    if let Err(e) = store.ensure_exists() {
        warn!(error = %e, "Could not create blocklist file, continuing with an empty list");
    }
    let blocked = match store.load() {
        Ok(words) => BlockedWordSet::from_entries(words),
        Err(e) => {
            warn!(error = %e, "Could not load blocklist, continuing with an empty list");
            BlockedWordSet::new()
        }
    };
    info!(entries = blocked.len(), "Blocklist loaded");

    let pipeline = ClassificationPipeline::new(
        moderation,
        completion,
        blocked,
        Arc::new(store),
        config.pipeline_settings(),
    );

    Ok(Moderator::new(
        pipeline,
        config.escalation(),
        config.timeout_duration_minutes,
        config.auto_moderate,
    ))
}

/// Create the external classifiers, or offline stand-ins without an API key.
fn create_classifiers(
    config: &Config,
) -> Result<(Arc<dyn ModerationClient>, Arc<dyn CompletionClient>)> {
    if let Err(e) = config.require_openai() {
        warn!("{e}");
        let moderation: Arc<dyn ModerationClient> = Arc::new(OfflineClassifier);
        let completion: Arc<dyn CompletionClient> = Arc::new(OfflineClassifier);
        return Ok((moderation, completion));
    }

    info!(base_url = %config.openai_base_url, "Using OpenAI-compatible classifiers");
    let client = Arc::new(OpenAiClient::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.moderation_model.clone(),
        config.classifier_timeout,
    )?);
    let moderation: Arc<dyn ModerationClient> = client.clone();
    let completion: Arc<dyn CompletionClient> = client;
    Ok((moderation, completion))
}

/// Read `subject_id<TAB>text` lines, skipping blanks and malformed lines.
fn read_messages(path: &Path) -> Result<Vec<(u64, String)>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut messages = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((subject, text)) = line.split_once('\t') else {
            warn!(line = lineno + 1, "Skipping line without a tab separator");
            continue;
        };
        match subject.trim().parse::<u64>() {
            Ok(subject_id) => messages.push((subject_id, text.to_string())),
            Err(_) => warn!(line = lineno + 1, "Skipping line with invalid subject id"),
        }
    }
    Ok(messages)
}
