// Modwarden: layered content moderation for chat communities
//
// This is the library root. `classify` produces verdicts, `enforcement`
// turns verdicts and warning history into actions, and `moderator` wires
// the two together for a host application.

pub mod classify;
pub mod config;
pub mod enforcement;
pub mod moderator;
pub mod output;
pub mod status;
pub mod store;
