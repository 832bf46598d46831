// Verdict: the normalized output of a classification call.
//
// Every tier of the pipeline produces one of these, whichever tier ends up
// deciding. Verdicts are built fresh per call and never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of violation (or non-violation) a verdict describes.
///
/// The string forms are stable and match what the classifiers emit, so they
/// can be logged and compared directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationType {
    Harassment,
    Hate,
    Threats,
    HateThreats,
    SelfHarm,
    Sexual,
    Spam,
    Toxicity,
    BlockedWord,
    Inappropriate,
    Clean,
    ParseError,
    AiError,
    /// Flagged externally but no category crossed its threshold,
    /// or the nuanced classifier omitted a type.
    Unknown,
    /// Any other tag the nuanced classifier chose to return.
    Other(String),
}

impl ViolationType {
    pub fn as_str(&self) -> &str {
        match self {
            ViolationType::Harassment => "harassment",
            ViolationType::Hate => "hate",
            ViolationType::Threats => "threats",
            ViolationType::HateThreats => "hate_threats",
            ViolationType::SelfHarm => "self_harm",
            ViolationType::Sexual => "sexual",
            ViolationType::Spam => "spam",
            ViolationType::Toxicity => "toxicity",
            ViolationType::BlockedWord => "blocked_word",
            ViolationType::Inappropriate => "inappropriate",
            ViolationType::Clean => "clean",
            ViolationType::ParseError => "parse_error",
            ViolationType::AiError => "ai_error",
            ViolationType::Unknown => "unknown",
            ViolationType::Other(tag) => tag,
        }
    }
}

impl From<&str> for ViolationType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "harassment" => ViolationType::Harassment,
            "hate" => ViolationType::Hate,
            "threats" => ViolationType::Threats,
            "hate_threats" => ViolationType::HateThreats,
            "self_harm" => ViolationType::SelfHarm,
            "sexual" => ViolationType::Sexual,
            "spam" => ViolationType::Spam,
            "toxicity" => ViolationType::Toxicity,
            "blocked_word" => ViolationType::BlockedWord,
            "inappropriate" => ViolationType::Inappropriate,
            "clean" => ViolationType::Clean,
            "parse_error" => ViolationType::ParseError,
            "ai_error" => ViolationType::AiError,
            "" | "unknown" => ViolationType::Unknown,
            other => ViolationType::Other(other.to_string()),
        }
    }
}

impl From<String> for ViolationType {
    fn from(tag: String) -> Self {
        ViolationType::from(tag.as_str())
    }
}

impl From<ViolationType> for String {
    fn from(kind: ViolationType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of classifying one unit of text.
///
/// Invariant: when `violation` is false, callers never escalate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub violation: bool,
    /// How severe the violation is, 0.0 to 1.0
    pub severity: f64,
    #[serde(rename = "type")]
    pub kind: ViolationType,
    /// Human-readable explanation
    pub reason: String,
    /// How confident the deciding tier is, 0.0 to 1.0
    pub confidence: f64,
    /// Raw scores/categories from whichever tier produced the verdict
    pub details: Value,
}

impl Verdict {
    /// A non-violating verdict reporting that classification could not be completed.
    pub fn unavailable(kind: ViolationType, reason: &str) -> Self {
        Self {
            violation: false,
            severity: 0.0,
            kind,
            reason: reason.to_string(),
            confidence: 0.0,
            details: Value::Null,
        }
    }
}
