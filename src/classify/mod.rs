// Text classification: turns one unit of user text into a Verdict.
//
// The pipeline runs cheap local checks first and only then spends calls on
// the external classifiers, which sit behind the traits in `traits` so tests
// can swap in scripted fakes.

pub mod blocklist;
pub mod heuristic;
pub mod openai;
pub mod pipeline;
pub mod rate_limiter;
pub mod thresholds;
pub mod traits;
pub mod verdict;

pub use blocklist::BlockedWordSet;
pub use pipeline::{ClassificationPipeline, PipelineSettings};
pub use thresholds::{ThresholdCategory, ThresholdSet};
pub use traits::{CompletionClient, ModerationClient, ModerationResult, TierFailure};
pub use verdict::{Verdict, ViolationType};
