// Enforcement: warning history and the policy that turns it into actions.
//
// This module only decides. Carrying out a warn, timeout, or ban belongs to
// whatever transport the host application uses.

pub mod escalation;
pub mod ledger;

pub use escalation::{decide, Action, EscalationConfig};
pub use ledger::{WarningKey, WarningLedger};
