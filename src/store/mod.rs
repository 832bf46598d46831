// Blocklist storage backends.

pub mod blocklist_file;
pub mod traits;

pub use blocklist_file::{JsonBlocklistStore, MemoryBlocklistStore};
pub use traits::BlocklistStore;
