// Classifier client traits: the seam between the pipeline and the outside world.
//
// The pipeline talks to at most two external classifiers: a general-purpose
// moderation endpoint (per-category flags and scores) and a prompt-completion
// endpoint used for nuanced review. Both sit behind traits so the HTTP
// implementation can be swapped, and so tests can script their behavior.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an external classifier call did not produce a usable answer.
#[derive(Debug, Error)]
pub enum TierFailure {
    /// Network-level failure (connection refused, DNS, TLS, ...)
    #[error("classifier request failed: {0}")]
    Transport(String),

    /// The classifier answered with a non-success status (auth, quota, ...)
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not finish within the configured budget
    #[error("classifier call timed out after {0} ms")]
    Timeout(u64),

    /// The classifier answered, but the body could not be interpreted
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// Per-category result of a moderation call.
///
/// Category names follow the moderation endpoint's conventions
/// (`harassment`, `hate/threatening`, `self-harm`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    #[serde(default)]
    pub categories: HashMap<String, bool>,
    #[serde(default)]
    pub category_scores: HashMap<String, f64>,
}

impl ModerationResult {
    /// Whether the named category was flagged.
    pub fn category(&self, name: &str) -> bool {
        self.categories.get(name).copied().unwrap_or(false)
    }

    /// The named category's score, 0.0 when absent.
    pub fn score(&self, name: &str) -> f64 {
        self.category_scores.get(name).copied().unwrap_or(0.0)
    }
}

/// A general-purpose moderation classifier.
#[async_trait]
pub trait ModerationClient: Send + Sync {
    /// Classify raw text into per-category flags and scores.
    async fn moderate(&self, text: &str) -> Result<ModerationResult, TierFailure>;
}

/// A prompt-completion model used for nuanced review.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a system instruction plus a user prompt to `model`, returning the
    /// raw reply text.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, TierFailure>;
}

#[async_trait]
impl<T: ModerationClient + ?Sized> ModerationClient for std::sync::Arc<T> {
    async fn moderate(&self, text: &str) -> Result<ModerationResult, TierFailure> {
        (**self).moderate(text).await
    }
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<T> {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, TierFailure> {
        (**self).complete(model, system, prompt).await
    }
}

/// Classifier used when no API key is configured: every call fails, which
/// routes the pipeline to its local fallback.
pub struct OfflineClassifier;

#[async_trait]
impl ModerationClient for OfflineClassifier {
    async fn moderate(&self, _text: &str) -> Result<ModerationResult, TierFailure> {
        Err(TierFailure::Transport(
            "no moderation endpoint configured".to_string(),
        ))
    }
}

#[async_trait]
impl CompletionClient for OfflineClassifier {
    async fn complete(
        &self,
        _model: &str,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, TierFailure> {
        Err(TierFailure::Transport(
            "no completion endpoint configured".to_string(),
        ))
    }
}
