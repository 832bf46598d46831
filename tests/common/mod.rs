// Scripted classifier fakes shared by the integration tests.
//
// Each fake records how often it was called and when, so tests can assert
// which tiers ran and how far apart external calls were issued.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use modwarden::classify::{
    BlockedWordSet, ClassificationPipeline, CompletionClient, ModerationClient, ModerationResult,
    PipelineSettings, TierFailure,
};
use modwarden::store::MemoryBlocklistStore;

pub enum Script<T> {
    Reply(T),
    Fail,
    /// Never answers within any reasonable timeout
    Hang,
}

pub struct FakeModeration {
    script: Script<ModerationResult>,
    calls: AtomicUsize,
    issued_at: Mutex<Vec<Instant>>,
}

impl FakeModeration {
    pub fn new(script: Script<ModerationResult>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            issued_at: Mutex::new(Vec::new()),
        })
    }

    pub fn flagged(entries: &[(&str, f64)]) -> Arc<Self> {
        Self::new(Script::Reply(flagged_result(entries)))
    }

    pub fn not_flagged() -> Arc<Self> {
        Self::new(Script::Reply(ModerationResult::default()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Script::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn issued_at(&self) -> Vec<Instant> {
        self.issued_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModerationClient for FakeModeration {
    async fn moderate(&self, _text: &str) -> Result<ModerationResult, TierFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.issued_at.lock().unwrap().push(Instant::now());
        match &self.script {
            Script::Reply(result) => Ok(result.clone()),
            Script::Fail => Err(TierFailure::Status {
                status: 401,
                body: "invalid api key".to_string(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ModerationResult::default())
            }
        }
    }
}

pub struct FakeCompletion {
    script: Script<String>,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn new(script: Script<String>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        Self::new(Script::Reply(reply.to_string()))
    }

    pub fn clean() -> Arc<Self> {
        Self::replying(
            r#"{"violation": false, "severity": 0, "type": "clean", "reason": "Looks fine", "confidence": 0.9}"#,
        )
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Script::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model named by each call, in call order.
    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(
        &self,
        model: &str,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, TierFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail => Err(TierFailure::Transport("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
        }
    }
}

/// A flagged moderation result where every listed category is flagged.
pub fn flagged_result(entries: &[(&str, f64)]) -> ModerationResult {
    ModerationResult {
        flagged: true,
        categories: entries
            .iter()
            .map(|(name, _)| (name.to_string(), true))
            .collect::<HashMap<_, _>>(),
        category_scores: entries
            .iter()
            .map(|(name, score)| (name.to_string(), *score))
            .collect::<HashMap<_, _>>(),
    }
}

/// Settings with no rate limiting and a short call budget.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        rate_limit_ms: 0,
        call_timeout: Duration::from_millis(200),
        ..PipelineSettings::default()
    }
}

pub fn pipeline_with(
    moderation: &Arc<FakeModeration>,
    completion: &Arc<FakeCompletion>,
    blocked: &[&str],
    settings: PipelineSettings,
) -> ClassificationPipeline {
    ClassificationPipeline::new(
        moderation.clone(),
        completion.clone(),
        BlockedWordSet::from_entries(blocked),
        Arc::new(MemoryBlocklistStore::new()),
        settings,
    )
}
