//! Achievement catalog: administrator-managed definitions

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::info;

use super::definitions::{AchievementDefinition, DefinitionId, DefinitionPatch, MAX_NAME_LEN};
use super::error::{AchievementError, Missing, Result};
use crate::library::GenreId;
use crate::store::{Database, is_unique_violation, now_ms};

/// CRUD over achievement definitions
///
/// Edits never trigger a resync; earned achievements catch up on the next
/// resync of each affected user.
#[derive(Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, name: &str, target: i64, category_scope: Option<GenreId>) -> Result<DefinitionId> {
        let name = validate_name(name)?;
        validate_target(target)?;

        let conn = self.db.conn();
        if let Some(genre) = category_scope {
            ensure_genre(&conn, genre)?;
        }
        match conn.execute(
            "INSERT INTO achievements (name, target, category_scope) VALUES (?1, ?2, ?3)",
            params![name, target, category_scope],
        ) {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                info!(achievement_id = id, name, target, ?category_scope, "achievement created");
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => Err(AchievementError::DuplicateName(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a configured seed definition the first time its name is seen.
    ///
    /// The seed name is recorded whether or not a definition is created, so a
    /// seed the administrator has since deleted or renamed stays gone. Returns
    /// the id of the definition when this call created it.
    pub fn seed(&self, name: &str, target: i64, category_scope: Option<GenreId>) -> Result<Option<DefinitionId>> {
        let name = validate_name(name)?;
        validate_target(target)?;

        let mut conn = self.db.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if seed_recorded(&tx, name)? {
            return Ok(None);
        }

        let existing = tx
            .query_row("SELECT id FROM achievements WHERE name = ?1", [name], |r| {
                r.get::<_, DefinitionId>(0)
            })
            .optional()?;
        let created = match existing {
            Some(_) => None,
            None => {
                if let Some(genre) = category_scope {
                    ensure_genre(&tx, genre)?;
                }
                tx.execute(
                    "INSERT INTO achievements (name, target, category_scope) VALUES (?1, ?2, ?3)",
                    params![name, target, category_scope],
                )?;
                Some(tx.last_insert_rowid())
            }
        };
        tx.execute(
            "INSERT INTO seeded_achievements (name, seeded_at) VALUES (?1, ?2)",
            params![name, now_ms()],
        )?;
        tx.commit()?;

        if let Some(id) = created {
            info!(achievement_id = id, name, target, "seed achievement created");
        }
        Ok(created)
    }

    /// Whether a seed with this name was already applied
    pub fn is_seeded(&self, name: &str) -> Result<bool> {
        let conn = self.db.conn();
        Ok(seed_recorded(&conn, name.trim())?)
    }

    pub fn get(&self, id: DefinitionId) -> Result<AchievementDefinition> {
        let conn = self.db.conn();
        load(&conn, id)?.ok_or(AchievementError::NotFound(Missing::Achievement(id)))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<AchievementDefinition>> {
        let conn = self.db.conn();
        let def = conn
            .query_row(
                "SELECT id, name, target, category_scope FROM achievements WHERE name = ?1",
                [name],
                definition_from_row,
            )
            .optional()?;
        Ok(def)
    }

    /// Snapshot of every definition, ordered by name
    pub fn list(&self) -> Result<Vec<AchievementDefinition>> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, target, category_scope FROM achievements ORDER BY name, id")?;
        let defs = stmt
            .query_map([], definition_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(defs)
    }

    pub fn update(&self, id: DefinitionId, patch: &DefinitionPatch) -> Result<AchievementDefinition> {
        let conn = self.db.conn();
        let mut def = load(&conn, id)?.ok_or(AchievementError::NotFound(Missing::Achievement(id)))?;
        if patch.is_empty() {
            return Ok(def);
        }

        if let Some(name) = &patch.name {
            def.name = validate_name(name)?.to_string();
        }
        if let Some(target) = patch.target {
            validate_target(target)?;
            def.target = target;
        }
        if let Some(scope) = patch.category_scope {
            if let Some(genre) = scope {
                ensure_genre(&conn, genre)?;
            }
            def.category_scope = scope;
        }

        let updated = conn.execute(
            "UPDATE achievements SET name = ?1, target = ?2, category_scope = ?3 WHERE id = ?4",
            params![def.name, def.target, def.category_scope, id],
        );
        match updated {
            Ok(_) => {
                info!(achievement_id = id, name = %def.name, target = def.target, "achievement updated");
                Ok(def)
            }
            Err(e) if is_unique_violation(&e) => Err(AchievementError::DuplicateName(def.name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a definition together with every earned record that points at it
    pub fn delete(&self, id: DefinitionId) -> Result<()> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let revoked = tx.execute("DELETE FROM earned_achievements WHERE achievement_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM achievements WHERE id = ?1", [id])?;
        if deleted == 0 {
            // Dropping the transaction rolls it back
            return Err(AchievementError::NotFound(Missing::Achievement(id)));
        }
        tx.commit()?;
        info!(achievement_id = id, revoked, "achievement deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AchievementError::InvalidName);
    }
    Ok(name)
}

fn validate_target(target: i64) -> Result<()> {
    if target <= 0 {
        return Err(AchievementError::InvalidTarget(target));
    }
    Ok(())
}

fn ensure_genre(conn: &Connection, genre: GenreId) -> Result<()> {
    let found = conn
        .query_row("SELECT 1 FROM genres WHERE id = ?1", [genre], |_| Ok(()))
        .optional()?;
    if found.is_none() {
        return Err(AchievementError::NotFound(Missing::Genre(genre)));
    }
    Ok(())
}

fn seed_recorded(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM seeded_achievements WHERE name = ?1", [name], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn load(conn: &Connection, id: DefinitionId) -> rusqlite::Result<Option<AchievementDefinition>> {
    conn.query_row(
        "SELECT id, name, target, category_scope FROM achievements WHERE id = ?1",
        [id],
        definition_from_row,
    )
    .optional()
}

pub(super) fn definition_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AchievementDefinition> {
    Ok(AchievementDefinition {
        id: r.get(0)?,
        name: r.get(1)?,
        target: r.get(2)?,
        category_scope: r.get(3)?,
    })
}
