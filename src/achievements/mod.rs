//! Achievement system: catalog, progress counting, decision engine and ledger
//!
//! ```text
//! library mutation ──► DecisionEngine::resync_user
//!                          │
//!            ┌─────────────┼──────────────┐
//!            ▼             ▼              ▼
//!         Catalog   ProgressCounter    Ledger
//!                          │
//!                          ▼
//!                   ActivitySource
//! ```

mod catalog;
mod definitions;
mod engine;
mod error;
mod ledger;
mod locks;
mod progress;

pub use catalog::Catalog;
pub use definitions::{AchievementDefinition, DefinitionId, DefinitionPatch, MAX_NAME_LEN};
pub use engine::{decide, AchievementEvent, Decision, DecisionEngine};
pub use error::{AchievementError, Missing};
pub use ledger::Ledger;
pub use locks::UserLocks;
pub use progress::{ActivitySource, ProgressCounter, SourceError};
