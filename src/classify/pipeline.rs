// Classification pipeline: blocklist, primary moderation, nuanced review,
// and a local heuristic fallback, tried in that order.
//
// Fallthrough rules:
// - a blocklist hit is final and never touches the network or the limiter
// - the primary tier's "not flagged" answer moves on to nuanced review
// - a failed primary call (including timeout) skips nuanced review and goes
//   straight to the heuristic tier
// - a failed nuanced call is final and reported as a non-violation
//
// `classify` never returns an error: every failure path ends in a verdict.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::blocklist::{self, BlockedWordSet};
use super::heuristic;
use super::rate_limiter::RateLimiter;
use super::thresholds::{ThresholdCategory, ThresholdSet};
use super::traits::{CompletionClient, ModerationClient, ModerationResult, TierFailure};
use super::verdict::{Verdict, ViolationType};
use crate::output::truncate_chars;
use crate::store::BlocklistStore;

/// Severity and confidence assigned to every blocklist hit.
pub const BLOCKLIST_SEVERITY: f64 = 0.95;

/// A flagged moderation result only counts as a violation above this score.
pub const MIN_FLAGGED_SCORE: f64 = 0.3;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

const SYSTEM_PROMPT: &str = "You are a content moderation assistant. Analyze messages \
objectively and only flag clear violations of community standards.";

/// What a moderation category's score is compared against.
enum Limit {
    Threshold(ThresholdCategory),
    Fixed(f64),
}

struct CategoryCheck {
    category: &'static str,
    kind: ViolationType,
    reason: &'static str,
    limit: Limit,
}

/// Fixed scan order. Later entries win ties on the highest score.
static CATEGORY_CHECKS: [CategoryCheck; 6] = [
    CategoryCheck {
        category: "harassment",
        kind: ViolationType::Harassment,
        reason: "Message contains harassment or bullying content",
        limit: Limit::Threshold(ThresholdCategory::Harassment),
    },
    CategoryCheck {
        category: "hate",
        kind: ViolationType::Hate,
        reason: "Message contains hate speech or discriminatory content",
        limit: Limit::Threshold(ThresholdCategory::Toxicity),
    },
    CategoryCheck {
        category: "harassment/threatening",
        kind: ViolationType::Threats,
        reason: "Message contains threatening language",
        limit: Limit::Threshold(ThresholdCategory::Harassment),
    },
    CategoryCheck {
        category: "hate/threatening",
        kind: ViolationType::HateThreats,
        reason: "Message contains threatening hate speech",
        limit: Limit::Threshold(ThresholdCategory::Toxicity),
    },
    CategoryCheck {
        category: "self-harm",
        kind: ViolationType::SelfHarm,
        reason: "Message contains self-harm content",
        limit: Limit::Fixed(0.5),
    },
    CategoryCheck {
        category: "sexual",
        kind: ViolationType::Sexual,
        reason: "Message contains inappropriate sexual content",
        limit: Limit::Fixed(0.8),
    },
];

/// Construction-time settings for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub thresholds: ThresholdSet,
    pub rate_limit_ms: u64,
    /// Budget for each individual external call
    pub call_timeout: Duration,
    /// Model asked for the nuanced review
    pub chat_model: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdSet::default(),
            rate_limit_ms: super::rate_limiter::DEFAULT_INTERVAL_MS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            chat_model: super::openai::DEFAULT_CHAT_MODEL.to_string(),
        }
    }
}

/// The multi-tier classifier.
///
/// Safe to share across tasks; every runtime setting is behind its own lock
/// and no lock is held across an await.
pub struct ClassificationPipeline {
    moderation: Arc<dyn ModerationClient>,
    completion: Arc<dyn CompletionClient>,
    store: Arc<dyn BlocklistStore>,
    thresholds: RwLock<ThresholdSet>,
    blocked: RwLock<BlockedWordSet>,
    /// Serializes blocklist saves so they land in update order
    save_lock: Mutex<()>,
    limiter: RateLimiter,
    call_timeout: Duration,
    chat_model: RwLock<String>,
}

impl ClassificationPipeline {
    /// Build a pipeline around the given classifiers.
    ///
    /// `blocked` is the already-loaded blocklist; `store` is only used to
    /// persist later updates.
    pub fn new(
        moderation: Arc<dyn ModerationClient>,
        completion: Arc<dyn CompletionClient>,
        blocked: BlockedWordSet,
        store: Arc<dyn BlocklistStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            moderation,
            completion,
            store,
            thresholds: RwLock::new(settings.thresholds),
            blocked: RwLock::new(blocked),
            save_lock: Mutex::new(()),
            limiter: RateLimiter::new(settings.rate_limit_ms),
            call_timeout: settings.call_timeout,
            chat_model: RwLock::new(settings.chat_model),
        }
    }

    /// Classify one unit of text.
    pub async fn classify(&self, text: &str) -> Verdict {
        if let Some(hit) = self.blocklist_hit(text) {
            info!(matched = %hit, "Blocklist hit");
            return blocklist_verdict(&hit);
        }

        match self.primary_tier(text).await {
            Ok(Some(verdict)) => {
                debug!(
                    violation = verdict.violation,
                    kind = %verdict.kind,
                    severity = verdict.severity,
                    "Primary tier decided"
                );
                verdict
            }
            Ok(None) => {
                debug!("Primary tier not flagged, running nuanced review");
                self.nuanced_tier(text).await
            }
            Err(e) => {
                warn!(
                    error = %e,
                    text_preview = %truncate_chars(text, 50),
                    "Primary classifier failed, using heuristic fallback"
                );
                heuristic::classify(text)
            }
        }
    }

    fn blocklist_hit(&self, text: &str) -> Option<String> {
        let blocked = self.read_blocked();
        blocklist::find_match(text, &blocked).map(str::to_string)
    }

    /// Returns `Ok(None)` when the moderation endpoint did not flag the text.
    async fn primary_tier(&self, text: &str) -> Result<Option<Verdict>, TierFailure> {
        self.limiter.acquire().await;
        let result = self.bounded(self.moderation.moderate(text)).await?;
        if !result.flagged {
            return Ok(None);
        }
        let thresholds = self.thresholds();
        Ok(Some(evaluate_moderation(&result, &thresholds)))
    }

    async fn nuanced_tier(&self, text: &str) -> Verdict {
        let prompt = nuanced_prompt(text);
        let model = self.chat_model();
        let reply = match self
            .bounded(self.completion.complete(&model, SYSTEM_PROMPT, &prompt))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Nuanced classifier failed");
                return Verdict::unavailable(ViolationType::AiError, "AI analysis unavailable");
            }
        };

        match parse_nuanced_response(&reply) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(
                    error = %e,
                    reply_preview = %truncate_chars(&reply, 80),
                    "Could not parse nuanced classifier reply"
                );
                Verdict::unavailable(ViolationType::ParseError, "Analysis failed")
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, TierFailure>
    where
        F: Future<Output = Result<T, TierFailure>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TierFailure::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    // --- Runtime settings ---

    pub fn thresholds(&self) -> ThresholdSet {
        *self.thresholds.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update one category threshold. Values outside [0, 1] are rejected.
    pub fn set_threshold(&self, category: ThresholdCategory, value: f64) -> bool {
        let mut thresholds = self.thresholds.write().unwrap_or_else(PoisonError::into_inner);
        let accepted = thresholds.set(category, value);
        if accepted {
            info!(category = %category, value, "Threshold updated");
        }
        accepted
    }

    pub fn rate_limit_ms(&self) -> u64 {
        self.limiter.interval_ms()
    }

    /// Change the minimum spacing between classifier calls. Negative values are rejected.
    pub fn set_rate_limit_ms(&self, ms: i64) -> bool {
        let accepted = self.limiter.set_interval_ms(ms);
        if accepted {
            info!(ms, "Rate limit updated");
        }
        accepted
    }

    /// Model used for the nuanced review.
    pub fn chat_model(&self) -> String {
        self.chat_model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch the nuanced review model. Blank names are rejected.
    pub fn set_chat_model(&self, model: &str) -> bool {
        let model = model.trim();
        if model.is_empty() {
            warn!("Rejected empty chat model name");
            return false;
        }
        *self.chat_model.write().unwrap_or_else(PoisonError::into_inner) = model.to_string();
        info!(model, "Chat model updated");
        true
    }

    /// Blocked entries in insertion order.
    pub fn blocked_words(&self) -> Vec<String> {
        self.read_blocked().to_vec()
    }

    /// Add one or more blocked entries and persist the result.
    ///
    /// Returns false when no entry survives normalization (nothing changes),
    /// or when saving fails (the in-memory set is still updated).
    pub fn add_blocked_words<I, S>(&self, entries: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|e| blocklist::normalize_entry(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        if entries.is_empty() {
            warn!("Rejected blocklist update with no valid entries");
            return false;
        }

        let _saving = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut blocked = self.write_blocked();
            let added = blocked.extend(&entries);
            info!(added, total = blocked.len(), "Blocked words added");
            blocked.to_vec()
        };
        self.persist(&snapshot)
    }

    /// Add entries from a bulk list separated by newlines, commas, or semicolons.
    pub fn add_blocked_word_list(&self, list: &str) -> bool {
        self.add_blocked_words(blocklist::parse_word_list(list))
    }

    /// Remove an entry and persist the result. The return value reports
    /// the save, so removing an absent entry still succeeds.
    pub fn remove_blocked_word(&self, entry: &str) -> bool {
        if blocklist::normalize_entry(entry).is_empty() {
            warn!("Rejected removal of an empty blocklist entry");
            return false;
        }
        let _saving = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut blocked = self.write_blocked();
            let removed = blocked.remove(entry);
            info!(removed, total = blocked.len(), "Blocked word removal");
            blocked.to_vec()
        };
        self.persist(&snapshot)
    }

    /// Callers hold `save_lock` but not the blocklist lock, so classification
    /// keeps reading the set while the store writes.
    fn persist(&self, words: &[String]) -> bool {
        match self.store.save(words) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist blocklist");
                false
            }
        }
    }

    fn read_blocked(&self) -> RwLockReadGuard<'_, BlockedWordSet> {
        self.blocked.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_blocked(&self) -> RwLockWriteGuard<'_, BlockedWordSet> {
        self.blocked.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn blocklist_verdict(hit: &str) -> Verdict {
    Verdict {
        violation: true,
        severity: BLOCKLIST_SEVERITY,
        kind: ViolationType::BlockedWord,
        reason: format!("Contains blocked word or phrase: \"{hit}\""),
        confidence: BLOCKLIST_SEVERITY,
        details: json!({ "blocked_word": hit }),
    }
}

/// Turn a flagged moderation result into a verdict.
///
/// A category qualifies when it is flagged and its score is strictly above
/// its limit. The highest qualifying score becomes severity and confidence;
/// the last category reaching that score supplies the type and reason.
pub fn evaluate_moderation(result: &ModerationResult, thresholds: &ThresholdSet) -> Verdict {
    let mut highest = 0.0_f64;
    let mut primary: Option<&CategoryCheck> = None;

    for check in &CATEGORY_CHECKS {
        let score = result.score(check.category);
        let limit = match check.limit {
            Limit::Threshold(category) => thresholds.get(category),
            Limit::Fixed(value) => value,
        };
        if result.category(check.category) && score > limit && score >= highest {
            highest = score;
            primary = Some(check);
        }
    }

    let (kind, reason) = match primary {
        Some(check) => (check.kind.clone(), check.reason),
        None => (ViolationType::Unknown, "Message violates community guidelines"),
    };

    Verdict {
        violation: result.flagged && highest > MIN_FLAGGED_SCORE,
        severity: highest,
        kind,
        reason: reason.to_string(),
        confidence: highest,
        details: json!({
            "moderation_categories": result.categories,
            "moderation_scores": result.category_scores,
        }),
    }
}

fn nuanced_prompt(text: &str) -> String {
    format!(
        "Analyze this message for moderation purposes. Evaluate it for:\n\
         1. Toxicity/harassment/bullying\n\
         2. Spam or repetitive content\n\
         3. Inappropriate content\n\
         4. Rule violations\n\
         \n\
         Message: \"{text}\"\n\
         \n\
         Respond with a JSON object containing:\n\
         - violation: boolean (true if violates rules)\n\
         - severity: number 0-1 (how severe the violation is)\n\
         - type: string (toxicity, spam, inappropriate, etc.)\n\
         - reason: string (brief explanation)\n\
         - confidence: number 0-1 (how confident you are)\n\
         \n\
         Only flag clear violations. Be conservative with borderline cases."
    )
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse the nuanced classifier's JSON reply into a verdict.
///
/// Missing fields fall back to non-violating defaults; severity and
/// confidence are clamped into [0, 1].
pub fn parse_nuanced_response(reply: &str) -> Result<Verdict, TierFailure> {
    let analysis: Value = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| TierFailure::Malformed(e.to_string()))?;
    let fields = analysis
        .as_object()
        .ok_or_else(|| TierFailure::Malformed("reply is not a JSON object".to_string()))?;

    let unit = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    };

    let violation = fields
        .get("violation")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .map(ViolationType::from)
        .unwrap_or(ViolationType::Unknown);
    let reason = fields
        .get("reason")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("Potential rule violation")
        .to_string();

    Ok(Verdict {
        violation,
        severity: unit("severity"),
        kind,
        reason,
        confidence: unit("confidence"),
        details: json!({ "analysis": analysis }),
    })
}
