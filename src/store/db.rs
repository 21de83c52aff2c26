//! SQLite database connection and schema management
//!
//! Manages the `~/.libris/libris.db` database with automatic schema migration.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

/// Shared database handle
///
/// Cloning is cheap; every clone talks to the same connection. Each operation
/// takes the connection through [`Database::conn`] and releases it when the
/// guard goes out of scope.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_millis(5000))
    }

    /// Open or create the database, waiting up to `busy_timeout` on locks held by other processes
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL lets the CLI and a long-running service share the file
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        debug!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Acquire the connection for the duration of one operation
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: genre-scoped achievements
        if version < 2 {
            let has_scope: bool = conn
                .prepare(
                    "SELECT COUNT(*) FROM pragma_table_info('achievements') WHERE name = 'category_scope'",
                )
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);

            if !has_scope {
                conn.execute_batch(
                    r#"
                    ALTER TABLE achievements ADD COLUMN category_scope INTEGER
                        REFERENCES genres(id) ON DELETE SET NULL;
                    "#,
                )?;
            }

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        // Migration 3: remember which configured seeds were applied
        if version < 3 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS seeded_achievements (
                    name TEXT PRIMARY KEY,
                    seeded_at INTEGER NOT NULL
                );
                INSERT OR REPLACE INTO schema_version VALUES (3);
                "#,
            )?;
        }

        Ok(())
    }

    /// Delete every earned achievement (definitions and library data are kept)
    pub fn reset_achievements(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("DELETE FROM earned_achievements;")?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    login TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT '',
    year INTEGER,
    pages INTEGER,
    UNIQUE (title, author)
);
CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);

CREATE TABLE IF NOT EXISTS book_genres (
    book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (book_id, genre_id)
);
CREATE INDEX IF NOT EXISTS idx_book_genres_genre ON book_genres(genre_id);

-- A user's library: one row per (user, book)
CREATE TABLE IF NOT EXISTS user_books (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
    rating INTEGER CHECK (rating BETWEEN 1 AND 5),
    added_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, book_id)
);

-- Achievement definitions
CREATE TABLE IF NOT EXISTS achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    target INTEGER NOT NULL CHECK (target > 0),
    category_scope INTEGER REFERENCES genres(id) ON DELETE SET NULL
);

-- Earned achievements, keyed by (user, definition)
CREATE TABLE IF NOT EXISTS earned_achievements (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    achievement_id INTEGER NOT NULL REFERENCES achievements(id) ON DELETE CASCADE,
    earned_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, achievement_id)
);
CREATE INDEX IF NOT EXISTS idx_earned_achievement ON earned_achievements(achievement_id);

CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;

/// True when `err` is a UNIQUE or PRIMARY KEY constraint violation
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Current timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("libris.db")).unwrap();

        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [
            "users",
            "books",
            "genres",
            "book_genres",
            "user_books",
            "achievements",
            "earned_achievements",
            "seeded_achievements",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("libris.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute("INSERT INTO genres (name) VALUES ('Poetry')", [])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM genres", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_migrates_unscoped_achievements_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE genres (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE);
                CREATE TABLE achievements (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    target INTEGER NOT NULL
                );
                INSERT INTO achievements (name, target) VALUES ('Reader I', 1);
                "#,
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let scope: Option<i64> = db
            .conn()
            .query_row(
                "SELECT category_scope FROM achievements WHERE name = 'Reader I'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(scope, None);
    }

    #[test]
    fn test_unique_violation_detection() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("libris.db")).unwrap();
        let conn = db.conn();
        conn.execute("INSERT INTO genres (name) VALUES ('Drama')", []).unwrap();
        let err = conn
            .execute("INSERT INTO genres (name) VALUES ('Drama')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
