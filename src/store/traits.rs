// Blocklist persistence trait, the pipeline's save hook.
//
// Implementors: JsonBlocklistStore (a JSON file on disk), MemoryBlocklistStore
// (tests and ephemeral runs). The pipeline loads once at startup and keeps
// the set resident; after that it only ever calls `save`.
//
// Methods are synchronous: saves are small and happen rarely, and the
// pipeline calls them while holding its blocklist write lock so writes land
// in update order.

use anyhow::Result;

pub trait BlocklistStore: Send + Sync {
    /// Load the stored entries. A store that has never been written returns
    /// an empty list rather than an error.
    fn load(&self) -> Result<Vec<String>>;

    /// Replace the stored entries with `words`.
    fn save(&self, words: &[String]) -> Result<()>;
}
