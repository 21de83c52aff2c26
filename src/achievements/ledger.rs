//! Earned-achievement ledger
//!
//! One row per (user, definition). Writes are idempotent so concurrent
//! resyncs converge instead of failing on each other.

use rusqlite::{OptionalExtension, params};

use super::catalog::definition_from_row;
use super::definitions::{AchievementDefinition, DefinitionId};
use super::error::Result;
use crate::library::UserId;
use crate::store::{Database, now_ms};

#[derive(Clone)]
pub struct Ledger {
    db: Database,
}

impl Ledger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn exists(&self, user: UserId, definition: DefinitionId) -> Result<bool> {
        let conn = self.db.conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM earned_achievements WHERE user_id = ?1 AND achievement_id = ?2",
                [user, definition],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record that `user` holds `definition`. Returns false when the row was
    /// already present or the definition no longer exists.
    pub fn grant(&self, user: UserId, definition: DefinitionId) -> Result<bool> {
        let conn = self.db.conn();
        // Selecting through `achievements` turns a grant for a just-deleted
        // definition into a no-op instead of a foreign key failure
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO earned_achievements (user_id, achievement_id, earned_at)
             SELECT ?1, id, ?3 FROM achievements WHERE id = ?2",
            params![user, definition, now_ms()],
        )?;
        Ok(inserted == 1)
    }

    /// Remove the record. Returns false when there was nothing to remove.
    pub fn revoke(&self, user: UserId, definition: DefinitionId) -> Result<bool> {
        let conn = self.db.conn();
        let deleted = conn.execute(
            "DELETE FROM earned_achievements WHERE user_id = ?1 AND achievement_id = ?2",
            [user, definition],
        )?;
        Ok(deleted == 1)
    }

    /// Definitions currently held by `user`, ordered by name
    pub fn list_for_user(&self, user: UserId) -> Result<Vec<AchievementDefinition>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.target, a.category_scope
             FROM earned_achievements e JOIN achievements a ON a.id = e.achievement_id
             WHERE e.user_id = ?1 ORDER BY a.name, a.id",
        )?;
        let defs = stmt
            .query_map([user], definition_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(defs)
    }

    /// Number of users holding `definition`
    pub fn holder_count(&self, definition: DefinitionId) -> Result<u64> {
        let conn = self.db.conn();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM earned_achievements WHERE achievement_id = ?1",
            [definition],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::Catalog;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Catalog, Ledger, UserId) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("libris.db")).unwrap();
        let user = {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO users (login, email, created_at) VALUES ('anna', 'a@x', 0)",
                [],
            )
            .unwrap();
            conn.last_insert_rowid()
        };
        (dir, Catalog::new(db.clone()), Ledger::new(db), user)
    }

    #[test]
    fn test_grant_and_revoke_are_idempotent() {
        let (_dir, catalog, ledger, user) = setup();
        let def = catalog.create("Reader I", 1, None).unwrap();

        assert!(!ledger.exists(user, def).unwrap());
        assert!(ledger.grant(user, def).unwrap());
        assert!(!ledger.grant(user, def).unwrap());
        assert!(ledger.exists(user, def).unwrap());
        assert_eq!(ledger.holder_count(def).unwrap(), 1);

        assert!(ledger.revoke(user, def).unwrap());
        assert!(!ledger.revoke(user, def).unwrap());
        assert!(!ledger.exists(user, def).unwrap());
    }

    #[test]
    fn test_grant_for_deleted_definition_is_noop() {
        let (_dir, catalog, ledger, user) = setup();
        let def = catalog.create("Reader I", 1, None).unwrap();
        catalog.delete(def).unwrap();

        assert!(!ledger.grant(user, def).unwrap());
        assert!(!ledger.exists(user, def).unwrap());
    }

    #[test]
    fn test_list_for_user_joins_definitions() {
        let (_dir, catalog, ledger, user) = setup();
        let b = catalog.create("Bookworm", 10, None).unwrap();
        let a = catalog.create("Avid Reader", 5, None).unwrap();
        catalog.create("Unearned", 3, None).unwrap();
        ledger.grant(user, b).unwrap();
        ledger.grant(user, a).unwrap();

        let earned = ledger.list_for_user(user).unwrap();
        let names: Vec<&str> = earned.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Avid Reader", "Bookworm"]);
        assert_eq!(earned[0].target, 5);
    }
}
