// Escalation policy: verdict + warning history -> enforcement action.
//
// Pure and deterministic. The severity cut-offs are fixed and separate from
// the per-category thresholds the classifier uses.

use serde::{Deserialize, Serialize};

use crate::classify::Verdict;

/// Severity at or above which a single message triggers strong action.
pub const SEVERE_SEVERITY: f64 = 0.9;

/// Severity at or above which repeat offenders are timed out.
pub const REPEAT_SEVERITY: f64 = 0.7;

/// What the transport layer should do about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Warn,
    Timeout,
    Ban,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Warn => "warn",
            Action::Timeout => "timeout",
            Action::Ban => "ban",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Warnings a subject may accumulate before repeat violations time out. At least 1.
    pub max_warnings_before_timeout: u32,
    /// Ban, rather than time out, on a single severe violation
    pub ban_on_repeat_severe_offense: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_warnings_before_timeout: 3,
            ban_on_repeat_severe_offense: false,
        }
    }
}

/// Choose an action for a violating verdict.
///
/// `warning_count` is the subject's count including this violation.
/// Only the severe branch can ban.
pub fn decide(verdict: &Verdict, warning_count: u64, config: &EscalationConfig) -> Action {
    if verdict.severity >= SEVERE_SEVERITY {
        if config.ban_on_repeat_severe_offense {
            Action::Ban
        } else {
            Action::Timeout
        }
    } else if verdict.severity >= REPEAT_SEVERITY
        && warning_count >= u64::from(config.max_warnings_before_timeout)
    {
        Action::Timeout
    } else {
        Action::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ViolationType;

    fn verdict(severity: f64) -> Verdict {
        Verdict {
            violation: true,
            severity,
            kind: ViolationType::Harassment,
            reason: "test".to_string(),
            confidence: severity,
            details: serde_json::Value::Null,
        }
    }

    #[test]
    fn severe_without_ban_times_out_on_first_offense() {
        let config = EscalationConfig::default();
        assert_eq!(decide(&verdict(0.9), 1, &config), Action::Timeout);
    }

    #[test]
    fn moderate_severity_below_limit_warns() {
        let config = EscalationConfig::default();
        assert_eq!(decide(&verdict(0.8), 2, &config), Action::Warn);
        assert_eq!(decide(&verdict(0.8), 3, &config), Action::Timeout);
    }

    #[test]
    fn low_severity_never_escalates() {
        let config = EscalationConfig::default();
        assert_eq!(decide(&verdict(0.69), 100, &config), Action::Warn);
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Action::Ban).unwrap(), "ban");
        assert_eq!(Action::Timeout.to_string(), "timeout");
    }
}
