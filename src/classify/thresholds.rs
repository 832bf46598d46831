// Per-category thresholds used by the primary classification tier.
//
// Values are always within [0, 1]. Updates outside that range (or NaN) are
// rejected rather than clamped, and leave the previous value in place.

use serde::Serialize;
use tracing::warn;

/// The three categories whose thresholds can be tuned at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdCategory {
    Toxicity,
    Spam,
    Harassment,
}

impl ThresholdCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdCategory::Toxicity => "toxicity",
            ThresholdCategory::Spam => "spam",
            ThresholdCategory::Harassment => "harassment",
        }
    }
}

impl std::str::FromStr for ThresholdCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "toxicity" => Ok(ThresholdCategory::Toxicity),
            "spam" => Ok(ThresholdCategory::Spam),
            "harassment" => Ok(ThresholdCategory::Harassment),
            other => anyhow::bail!("Unknown threshold category: {other}"),
        }
    }
}

impl std::fmt::Display for ThresholdCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category thresholds, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSet {
    toxicity: f64,
    spam: f64,
    harassment: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            toxicity: 0.7,
            spam: 0.8,
            harassment: 0.75,
        }
    }
}

/// Whether a value is acceptable as a threshold.
pub fn is_valid_threshold(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl ThresholdSet {
    /// Build a threshold set, returning None if any value is out of range.
    pub fn new(toxicity: f64, spam: f64, harassment: f64) -> Option<Self> {
        if [toxicity, spam, harassment]
            .iter()
            .all(|v| is_valid_threshold(*v))
        {
            Some(Self {
                toxicity,
                spam,
                harassment,
            })
        } else {
            None
        }
    }

    pub fn toxicity(&self) -> f64 {
        self.toxicity
    }

    pub fn spam(&self) -> f64 {
        self.spam
    }

    pub fn harassment(&self) -> f64 {
        self.harassment
    }

    pub fn get(&self, category: ThresholdCategory) -> f64 {
        match category {
            ThresholdCategory::Toxicity => self.toxicity,
            ThresholdCategory::Spam => self.spam,
            ThresholdCategory::Harassment => self.harassment,
        }
    }

    /// Update one category. Returns false (and changes nothing) if the value
    /// is outside [0, 1].
    pub fn set(&mut self, category: ThresholdCategory, value: f64) -> bool {
        if !is_valid_threshold(value) {
            warn!(category = %category, value, "Rejected out-of-range threshold");
            return false;
        }
        match category {
            ThresholdCategory::Toxicity => self.toxicity = value,
            ThresholdCategory::Spam => self.spam = value,
            ThresholdCategory::Harassment => self.harassment = value,
        }
        true
    }
}
