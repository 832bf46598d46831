// System status display: current thresholds, rate limit, escalation
// settings, and blocklist size.

use std::path::Path;

use crate::config::Config;
use crate::moderator::Moderator;

/// Display system status to the terminal.
pub fn show(moderator: &Moderator, config: &Config) {
    let pipeline = moderator.pipeline();

    if config.openai_api_key.is_empty() {
        println!("Classifier: offline (OPENAI_API_KEY not set, heuristics only)");
    } else {
        println!(
            "Classifier: {} (moderation: {}, review: {})",
            config.openai_base_url,
            config.moderation_model,
            pipeline.chat_model()
        );
    }

    let thresholds = pipeline.thresholds();
    println!(
        "Thresholds: toxicity {:.2}, spam {:.2}, harassment {:.2}",
        thresholds.toxicity(),
        thresholds.spam(),
        thresholds.harassment()
    );
    println!("Rate limit: {} ms between classifier calls", pipeline.rate_limit_ms());

    let escalation = moderator.escalation();
    println!(
        "Escalation: timeout after {} warnings, severe offenses {}",
        escalation.max_warnings_before_timeout,
        if escalation.ban_on_repeat_severe_offense {
            "ban"
        } else {
            "time out"
        }
    );
    println!(
        "Timeout duration: {} minutes",
        moderator.timeout_duration().as_secs() / 60
    );
    println!(
        "Auto-moderation: {}",
        if moderator.auto_moderate() {
            "on"
        } else {
            "off"
        }
    );

    let path = config.blocked_words_path.display();
    let count = pipeline.blocked_words().len();
    if Path::new(&config.blocked_words_path).exists() {
        println!("Blocklist: {} entries ({})", count, path);
    } else {
        println!("Blocklist: {} entries ({} not created yet)", count, path);
    }
}
