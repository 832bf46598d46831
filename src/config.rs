use std::env;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::classify::openai::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_MODERATION_MODEL};
use crate::classify::thresholds::{is_valid_threshold, ThresholdSet};
use crate::classify::PipelineSettings;
use crate::enforcement::EscalationConfig;
use crate::moderator::DEFAULT_TIMEOUT_MINUTES;

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars only. The .env file is loaded at startup via
/// dotenvy. Everything here is a starting value: the pipeline and moderator
/// take owned copies and can be retuned at runtime without touching the
/// process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible API
    pub openai_base_url: String,
    pub moderation_model: String,
    pub chat_model: String,
    pub thresholds: ThresholdSet,
    pub rate_limit_ms: u64,
    pub max_warnings_before_timeout: u32,
    pub ban_on_repeat_offense: bool,
    pub timeout_duration_minutes: NonZeroU64,
    /// Per-call budget for each external classifier request
    pub classifier_timeout: Duration,
    pub blocked_words_path: PathBuf,
    pub auto_moderate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            thresholds: ThresholdSet::default(),
            rate_limit_ms: crate::classify::rate_limiter::DEFAULT_INTERVAL_MS,
            max_warnings_before_timeout: 3,
            ban_on_repeat_offense: false,
            timeout_duration_minutes: DEFAULT_TIMEOUT_MINUTES,
            classifier_timeout: Duration::from_secs(5),
            blocked_words_path: PathBuf::from("config/blocked_words.json"),
            auto_moderate: false,
        }
    }
}

/// Read and parse an env var, falling back to `default` when it is unset or
/// unparseable.
fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Unparseable config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn string_var(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_zero(key: &str, value: u64) -> Result<NonZeroU64> {
    NonZeroU64::new(value).ok_or_else(|| anyhow::anyhow!("{key} must be at least 1"))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults. Values that parse but
    /// are out of range (a threshold above 1, zero warnings) are an error.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let toxicity = parsed_var("TOXICITY_THRESHOLD", defaults.thresholds.toxicity());
        let spam = parsed_var("SPAM_THRESHOLD", defaults.thresholds.spam());
        let harassment = parsed_var("HARASSMENT_THRESHOLD", defaults.thresholds.harassment());
        for (key, value) in [
            ("TOXICITY_THRESHOLD", toxicity),
            ("SPAM_THRESHOLD", spam),
            ("HARASSMENT_THRESHOLD", harassment),
        ] {
            if !is_valid_threshold(value) {
                anyhow::bail!("{key} must be between 0 and 1 (got {value})");
            }
        }
        let thresholds = ThresholdSet::new(toxicity, spam, harassment)
            .ok_or_else(|| anyhow::anyhow!("Invalid threshold configuration"))?;

        let max_warnings_before_timeout = parsed_var(
            "MAX_WARNINGS_BEFORE_TIMEOUT",
            defaults.max_warnings_before_timeout,
        );
        if max_warnings_before_timeout == 0 {
            anyhow::bail!("MAX_WARNINGS_BEFORE_TIMEOUT must be at least 1");
        }

        let timeout_duration_minutes = non_zero(
            "TIMEOUT_DURATION_MINUTES",
            parsed_var(
                "TIMEOUT_DURATION_MINUTES",
                defaults.timeout_duration_minutes.get(),
            ),
        )?;

        let classifier_timeout_secs =
            parsed_var("CLASSIFIER_TIMEOUT_SECS", defaults.classifier_timeout.as_secs());
        if classifier_timeout_secs == 0 {
            anyhow::bail!("CLASSIFIER_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: string_var("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            moderation_model: string_var("MODERATION_MODEL", DEFAULT_MODERATION_MODEL),
            chat_model: string_var("GPT_MODEL", DEFAULT_CHAT_MODEL),
            thresholds,
            rate_limit_ms: parsed_var("RATE_LIMIT_MS", defaults.rate_limit_ms),
            max_warnings_before_timeout,
            ban_on_repeat_offense: parsed_var(
                "BAN_ON_REPEAT_OFFENSE",
                defaults.ban_on_repeat_offense,
            ),
            timeout_duration_minutes,
            classifier_timeout: Duration::from_secs(classifier_timeout_secs),
            blocked_words_path: env::var("BLOCKED_WORDS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.blocked_words_path),
            auto_moderate: parsed_var("AUTO_MODERATE", defaults.auto_moderate),
        })
    }

    /// Check that the OpenAI API key is configured.
    /// Call this before any operation that needs the external classifiers.
    pub fn require_openai(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            anyhow::bail!(
                "OPENAI_API_KEY not set. Add it to your .env file.\n\
                 Without it every message is judged by the blocklist and local heuristics only."
            );
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            thresholds: self.thresholds,
            rate_limit_ms: self.rate_limit_ms,
            call_timeout: self.classifier_timeout,
            chat_model: self.chat_model.clone(),
        }
    }

    pub fn escalation(&self) -> EscalationConfig {
        EscalationConfig {
            max_warnings_before_timeout: self.max_warnings_before_timeout,
            ban_on_repeat_severe_offense: self.ban_on_repeat_offense,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.moderation_model, "omni-moderation-latest");
        assert_eq!(config.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.rate_limit_ms, 1000);
        assert_eq!(config.max_warnings_before_timeout, 3);
        assert!(!config.ban_on_repeat_offense);
        assert_eq!(config.timeout_duration_minutes.get(), 10);
        assert_eq!(config.classifier_timeout, Duration::from_secs(5));
        assert!(!config.auto_moderate);
    }

    #[test]
    fn zero_timeout_minutes_is_an_error() {
        let err = non_zero("TIMEOUT_DURATION_MINUTES", 0).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
        assert_eq!(non_zero("TIMEOUT_DURATION_MINUTES", 15).unwrap().get(), 15);
    }

    #[test]
    fn missing_key_fails_require_openai() {
        let config = Config::default();
        let err = config.require_openai().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn escalation_and_pipeline_settings_mirror_config() {
        let config = Config {
            max_warnings_before_timeout: 5,
            ban_on_repeat_offense: true,
            rate_limit_ms: 250,
            ..Config::default()
        };
        let escalation = config.escalation();
        assert_eq!(escalation.max_warnings_before_timeout, 5);
        assert!(escalation.ban_on_repeat_severe_offense);
        assert_eq!(config.pipeline_settings().rate_limit_ms, 250);
    }
}
