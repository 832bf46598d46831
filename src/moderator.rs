// Moderator: the violation handler that ties classification to enforcement.
//
// For each message it classifies the text, bumps the author's warning count
// on a violation, and asks the escalation policy what to do. It returns the
// decision; carrying it out (deleting, timing out, banning) is left to the
// host's transport layer.

use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationPipeline, Verdict};
use crate::enforcement::{decide, Action, EscalationConfig, WarningLedger};
use crate::output::truncate_chars;

/// Most messages a single bulk scan will look at.
pub const MAX_SCAN_MESSAGES: usize = 100;

pub const DEFAULT_TIMEOUT_MINUTES: NonZeroU64 = NonZeroU64::MIN.saturating_add(9);

/// What happened to one message.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub scope_id: u64,
    pub subject_id: u64,
    /// None when the message was skipped (auto-moderation off, empty text)
    pub verdict: Option<Verdict>,
    /// The subject's warning count after this message
    pub warning_count: u64,
    /// None for non-violations
    pub action: Option<Action>,
    /// Set only when `action` is a timeout
    pub timeout: Option<Duration>,
    pub decided_at: DateTime<Utc>,
}

impl ModerationOutcome {
    pub fn is_violation(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.violation)
    }
}

/// Aggregate counts for a bulk scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub checked: usize,
    pub violations: usize,
    /// Input messages beyond the scan limit
    pub skipped: usize,
    pub actions: BTreeMap<String, usize>,
    pub types: BTreeMap<String, usize>,
}

impl ScanSummary {
    fn record(&mut self, outcome: &ModerationOutcome) {
        self.checked += 1;
        if let Some(action) = outcome.action {
            *self.actions.entry(action.to_string()).or_insert(0) += 1;
        }
        if let Some(verdict) = outcome.verdict.as_ref().filter(|v| v.violation) {
            self.violations += 1;
            *self.types.entry(verdict.kind.to_string()).or_insert(0) += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub outcomes: Vec<ModerationOutcome>,
    pub summary: ScanSummary,
}

#[derive(Debug, Clone, Copy)]
struct EnforcementSettings {
    escalation: EscalationConfig,
    timeout: Duration,
}

pub struct Moderator {
    pipeline: ClassificationPipeline,
    ledger: WarningLedger,
    settings: RwLock<EnforcementSettings>,
    auto_moderate: AtomicBool,
}

impl Moderator {
    pub fn new(
        pipeline: ClassificationPipeline,
        escalation: EscalationConfig,
        timeout_minutes: NonZeroU64,
        auto_moderate: bool,
    ) -> Self {
        Self {
            pipeline,
            ledger: WarningLedger::new(),
            settings: RwLock::new(EnforcementSettings {
                escalation,
                timeout: Duration::from_secs(timeout_minutes.get().saturating_mul(60)),
            }),
            auto_moderate: AtomicBool::new(auto_moderate),
        }
    }

    /// The classifier, for direct classification and its runtime settings.
    pub fn pipeline(&self) -> &ClassificationPipeline {
        &self.pipeline
    }

    pub fn ledger(&self) -> &WarningLedger {
        &self.ledger
    }

    /// Handle an incoming message. Skips everything when auto-moderation is off.
    pub async fn moderate(&self, scope_id: u64, subject_id: u64, text: &str) -> ModerationOutcome {
        if !self.auto_moderate() {
            debug!(scope_id, subject_id, "Auto-moderation disabled, skipping");
            return self.skipped(scope_id, subject_id);
        }
        self.handle(scope_id, subject_id, text).await
    }

    /// Classify and, on a violation, record a warning and pick an action.
    async fn handle(&self, scope_id: u64, subject_id: u64, text: &str) -> ModerationOutcome {
        if text.trim().is_empty() {
            debug!(scope_id, subject_id, "Empty message, skipping");
            return self.skipped(scope_id, subject_id);
        }

        let verdict = self.pipeline.classify(text).await;
        if !verdict.violation {
            return ModerationOutcome {
                scope_id,
                subject_id,
                warning_count: self.ledger.get(scope_id, subject_id),
                verdict: Some(verdict),
                action: None,
                timeout: None,
                decided_at: Utc::now(),
            };
        }

        let warning_count = self.ledger.increment(scope_id, subject_id);
        let settings = self.enforcement_settings();
        let action = decide(&verdict, warning_count, &settings.escalation);
        let timeout = (action == Action::Timeout).then_some(settings.timeout);

        info!(
            scope_id,
            subject_id,
            kind = %verdict.kind,
            severity = verdict.severity,
            warning_count,
            action = %action,
            text_preview = %truncate_chars(text, 50),
            "Violation handled"
        );

        ModerationOutcome {
            scope_id,
            subject_id,
            verdict: Some(verdict),
            warning_count,
            action: Some(action),
            timeout,
            decided_at: Utc::now(),
        }
    }

    fn skipped(&self, scope_id: u64, subject_id: u64) -> ModerationOutcome {
        ModerationOutcome {
            scope_id,
            subject_id,
            verdict: None,
            warning_count: self.ledger.get(scope_id, subject_id),
            action: None,
            timeout: None,
            decided_at: Utc::now(),
        }
    }

    /// Run the violation handler over a batch of historical `(subject, text)`
    /// messages, up to `MAX_SCAN_MESSAGES`, with at most `concurrency` in flight.
    ///
    /// Scans are operator-initiated, so they run even with auto-moderation off.
    /// Outcomes come back in completion order. `progress`, when given, ticks
    /// once per finished message.
    pub async fn scan(
        &self,
        scope_id: u64,
        messages: Vec<(u64, String)>,
        concurrency: usize,
        progress: Option<&ProgressBar>,
    ) -> ScanReport {
        let skipped = messages.len().saturating_sub(MAX_SCAN_MESSAGES);
        if skipped > 0 {
            warn!(
                total = messages.len(),
                limit = MAX_SCAN_MESSAGES,
                "Scan input exceeds limit, ignoring the rest"
            );
        }

        let outcomes: Vec<ModerationOutcome> = stream::iter(
            messages
                .into_iter()
                .take(MAX_SCAN_MESSAGES)
                .map(|(subject_id, text)| async move {
                    self.handle(scope_id, subject_id, &text).await
                }),
        )
        .buffer_unordered(concurrency.max(1))
        .inspect(|_| {
            if let Some(pb) = progress {
                pb.inc(1);
            }
        })
        .collect()
        .await;

        let mut summary = ScanSummary {
            skipped,
            ..ScanSummary::default()
        };
        for outcome in &outcomes {
            summary.record(outcome);
        }
        info!(
            scope_id,
            checked = summary.checked,
            violations = summary.violations,
            "Scan complete"
        );

        ScanReport { outcomes, summary }
    }

    // --- Manual actions and ledger pass-throughs ---

    /// Manually warn a subject. Returns the new count.
    pub fn warn(&self, scope_id: u64, subject_id: u64) -> u64 {
        let count = self.ledger.increment(scope_id, subject_id);
        info!(scope_id, subject_id, warning_count = count, "Manual warning");
        count
    }

    pub fn warnings(&self, scope_id: u64, subject_id: u64) -> u64 {
        self.ledger.get(scope_id, subject_id)
    }

    pub fn clear_warnings(&self, scope_id: u64, subject_id: u64) -> bool {
        self.ledger.clear(scope_id, subject_id)
    }

    pub fn clear_scope_warnings(&self, scope_id: u64) -> usize {
        self.ledger.clear_scope(scope_id)
    }

    // --- Runtime settings ---

    pub fn auto_moderate(&self) -> bool {
        self.auto_moderate.load(Ordering::Relaxed)
    }

    pub fn set_auto_moderate(&self, enabled: bool) {
        self.auto_moderate.store(enabled, Ordering::Relaxed);
        info!(enabled, "Auto-moderation toggled");
    }

    pub fn escalation(&self) -> EscalationConfig {
        self.enforcement_settings().escalation
    }

    pub fn timeout_duration(&self) -> Duration {
        self.enforcement_settings().timeout
    }

    /// Set the timeout length applied on `Action::Timeout`. Rejects values ≤ 0.
    pub fn set_timeout_minutes(&self, minutes: i64) -> bool {
        let Some(minutes) = u64::try_from(minutes).ok().filter(|m| *m > 0) else {
            warn!(minutes, "Rejected non-positive timeout duration");
            return false;
        };
        self.write_settings().timeout = Duration::from_secs(minutes.saturating_mul(60));
        info!(minutes, "Timeout duration updated");
        true
    }

    /// Set how many warnings a subject may collect before repeat violations
    /// time out. Rejects values below 1.
    pub fn set_max_warnings(&self, max: i64) -> bool {
        let Some(max) = u32::try_from(max).ok().filter(|m| *m > 0) else {
            warn!(max, "Rejected max warnings below 1");
            return false;
        };
        self.write_settings().escalation.max_warnings_before_timeout = max;
        info!(max, "Max warnings updated");
        true
    }

    pub fn set_ban_on_repeat(&self, enabled: bool) {
        self.write_settings().escalation.ban_on_repeat_severe_offense = enabled;
        info!(enabled, "Ban on severe offense toggled");
    }

    fn enforcement_settings(&self) -> EnforcementSettings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self) -> std::sync::RwLockWriteGuard<'_, EnforcementSettings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::traits::OfflineClassifier;
    use crate::classify::{BlockedWordSet, PipelineSettings};
    use crate::store::MemoryBlocklistStore;
    use std::sync::Arc;

    fn offline_moderator(blocked: &[&str]) -> Moderator {
        let pipeline = ClassificationPipeline::new(
            Arc::new(OfflineClassifier),
            Arc::new(OfflineClassifier),
            BlockedWordSet::from_entries(blocked),
            Arc::new(MemoryBlocklistStore::new()),
            PipelineSettings {
                rate_limit_ms: 0,
                ..PipelineSettings::default()
            },
        );
        Moderator::new(
            pipeline,
            EscalationConfig::default(),
            DEFAULT_TIMEOUT_MINUTES,
            true,
        )
    }

    #[tokio::test]
    async fn blocked_word_times_out_with_configured_duration() {
        let moderator = offline_moderator(&["forbidden"]);
        let outcome = moderator.moderate(1, 2, "this is forbidden").await;
        assert!(outcome.is_violation());
        assert_eq!(outcome.warning_count, 1);
        assert_eq!(outcome.action, Some(Action::Timeout));
        assert_eq!(outcome.timeout, Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn clean_message_leaves_ledger_untouched() {
        let moderator = offline_moderator(&[]);
        let outcome = moderator.moderate(1, 2, "good morning everyone").await;
        assert!(!outcome.is_violation());
        assert_eq!(outcome.action, None);
        assert_eq!(moderator.warnings(1, 2), 0);
    }

    #[tokio::test]
    async fn auto_moderate_off_skips_classification() {
        let moderator = offline_moderator(&["forbidden"]);
        moderator.set_auto_moderate(false);
        let outcome = moderator.moderate(1, 2, "forbidden").await;
        assert!(outcome.verdict.is_none());
        assert_eq!(moderator.warnings(1, 2), 0);
    }

    #[tokio::test]
    async fn empty_text_is_skipped() {
        let moderator = offline_moderator(&[]);
        let outcome = moderator.moderate(1, 2, "   ").await;
        assert!(outcome.verdict.is_none());
    }

    #[test]
    fn setters_reject_invalid_values() {
        let moderator = offline_moderator(&[]);
        assert!(!moderator.set_timeout_minutes(0));
        assert!(!moderator.set_timeout_minutes(-5));
        assert_eq!(moderator.timeout_duration(), Duration::from_secs(600));
        assert!(moderator.set_timeout_minutes(30));
        assert_eq!(moderator.timeout_duration(), Duration::from_secs(1800));

        assert!(!moderator.set_max_warnings(0));
        assert_eq!(moderator.escalation().max_warnings_before_timeout, 3);
        assert!(moderator.set_max_warnings(5));
        assert_eq!(moderator.escalation().max_warnings_before_timeout, 5);
    }

    #[test]
    fn constructor_keeps_timeout_as_given() {
        let pipeline = ClassificationPipeline::new(
            Arc::new(OfflineClassifier),
            Arc::new(OfflineClassifier),
            BlockedWordSet::new(),
            Arc::new(MemoryBlocklistStore::new()),
            PipelineSettings::default(),
        );
        let moderator =
            Moderator::new(pipeline, EscalationConfig::default(), NonZeroU64::MIN, false);
        assert_eq!(moderator.timeout_duration(), Duration::from_secs(60));
        assert_eq!(DEFAULT_TIMEOUT_MINUTES.get(), 10);
    }

    #[test]
    fn manual_warn_increments() {
        let moderator = offline_moderator(&[]);
        assert_eq!(moderator.warn(7, 8), 1);
        assert_eq!(moderator.warn(7, 8), 2);
        assert!(moderator.clear_warnings(7, 8));
        assert_eq!(moderator.warnings(7, 8), 0);
    }
}
