//! Decision engine: keeps each user's earned achievements in line with their library
//!
//! A resync re-evaluates the whole catalog for one user. Counts are cheap and
//! the catalog is small, so nothing is tracked incrementally.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::catalog::Catalog;
use super::definitions::AchievementDefinition;
use super::error::{AchievementError, Missing, Result};
use super::ledger::Ledger;
use super::locks::UserLocks;
use super::progress::{ActivitySource, ProgressCounter};
use crate::library::UserId;

/// A change a resync made to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "achievement", rename_all = "snake_case")]
pub enum AchievementEvent {
    Granted(AchievementDefinition),
    Revoked(AchievementDefinition),
}

impl AchievementEvent {
    pub fn definition(&self) -> &AchievementDefinition {
        match self {
            Self::Granted(def) | Self::Revoked(def) => def,
        }
    }
}

/// What to do with one (user, definition) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Grant,
    Revoke,
    Keep,
}

/// Compare progress against the award predicate and the current ledger state
pub fn decide(definition: &AchievementDefinition, count: i64, held: bool) -> Decision {
    match (definition.is_met_by(count), held) {
        (true, false) => Decision::Grant,
        (false, true) => Decision::Revoke,
        _ => Decision::Keep,
    }
}

#[derive(Clone)]
pub struct DecisionEngine {
    catalog: Catalog,
    ledger: Ledger,
    source: Arc<dyn ActivitySource>,
    counter: ProgressCounter,
    locks: Arc<UserLocks>,
}

impl DecisionEngine {
    pub fn new(catalog: Catalog, ledger: Ledger, source: Arc<dyn ActivitySource>) -> Self {
        Self {
            catalog,
            ledger,
            counter: ProgressCounter::new(Arc::clone(&source)),
            source,
            locks: Arc::new(UserLocks::new()),
        }
    }

    /// Bring `user`'s earned achievements in line with their current activity.
    ///
    /// Calls for the same user run one at a time, in the order they acquire
    /// the user's lock. A failure part-way leaves earlier grants and revokes in
    /// place; calling again converges on the correct state.
    pub fn resync_user(&self, user: UserId) -> Result<Vec<AchievementEvent>> {
        self.locks.with_user(user, || self.resync_locked(user))
    }

    fn resync_locked(&self, user: UserId) -> Result<Vec<AchievementEvent>> {
        let exists = self
            .source
            .user_exists(user)
            .map_err(|e| AchievementError::unavailable(user, e))?;
        if !exists {
            return Err(AchievementError::NotFound(Missing::User(user)));
        }

        let definitions = self.catalog.list().map_err(|e| e.during_resync(user))?;
        let mut events = Vec::new();

        for definition in definitions {
            let count = self
                .counter
                .count(user, &definition)
                .map_err(|e| AchievementError::unavailable(user, e))?;
            let held = self
                .ledger
                .exists(user, definition.id)
                .map_err(|e| e.during_resync(user))?;

            let decision = decide(&definition, count, held);
            debug!(
                user_id = user,
                achievement_id = definition.id,
                count,
                target = definition.target,
                held,
                ?decision,
                "evaluated achievement"
            );

            match decision {
                Decision::Grant => {
                    // False means a concurrent writer got there first
                    if self.ledger.grant(user, definition.id).map_err(|e| e.during_resync(user))? {
                        info!(user_id = user, achievement = %definition.name, "achievement granted");
                        events.push(AchievementEvent::Granted(definition));
                    }
                }
                Decision::Revoke => {
                    if self.ledger.revoke(user, definition.id).map_err(|e| e.during_resync(user))? {
                        info!(user_id = user, achievement = %definition.name, "achievement revoked");
                        events.push(AchievementEvent::Revoked(definition));
                    }
                }
                Decision::Keep => {}
            }
        }

        Ok(events)
    }

    /// Run `f` while holding `user`'s resync lock
    pub fn with_user_lock<T>(&self, user: UserId, f: impl FnOnce() -> T) -> T {
        self.locks.with_user(user, f)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(target: i64) -> AchievementDefinition {
        AchievementDefinition {
            id: 1,
            name: "Reader".into(),
            target,
            category_scope: None,
        }
    }

    #[test]
    fn test_decide_table() {
        let d = def(3);
        assert_eq!(decide(&d, 3, false), Decision::Grant);
        assert_eq!(decide(&d, 3, true), Decision::Keep);
        assert_eq!(decide(&d, 2, true), Decision::Revoke);
        assert_eq!(decide(&d, 4, true), Decision::Revoke);
        assert_eq!(decide(&d, 4, false), Decision::Keep);
        assert_eq!(decide(&d, 0, false), Decision::Keep);
    }
}
