//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;

use libris::Libris;
use libris::achievements::{ActivitySource, SourceError};
use libris::library::{BookId, GenreId, Library, NewBook, UserId};

/// A fresh database in a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub libris: Libris,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let libris = Libris::with_path(&dir.path().join("libris.db")).expect("Failed to open db");
        Self { dir, libris }
    }

    pub fn user(&self, login: &str) -> UserId {
        self.libris
            .library()
            .create_user(login, &format!("{login}@example.com"))
            .expect("Failed to create user")
    }

    pub fn genre(&self, name: &str) -> GenreId {
        self.libris.library().create_genre(name).expect("Failed to create genre")
    }

    /// Register a book tagged with `genres`
    pub fn book(&self, title: &str, genres: &[GenreId]) -> BookId {
        let library = self.libris.library();
        let id = library
            .create_book(&NewBook::titled(title))
            .expect("Failed to create book");
        for genre in genres {
            library.tag_book(id, *genre).expect("Failed to tag book");
        }
        id
    }

    /// Names of the achievements `user` currently holds
    pub fn earned(&self, user: UserId) -> Vec<String> {
        self.libris
            .earned_achievements(user)
            .expect("Failed to list earned achievements")
            .into_iter()
            .map(|d| d.name)
            .collect()
    }

    /// Number of ledger rows for `user`
    pub fn ledger_rows(&self, user: UserId) -> i64 {
        self.libris
            .database()
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM earned_achievements WHERE user_id = ?1",
                [user],
                |r| r.get(0),
            )
            .expect("Failed to count ledger rows")
    }
}

/// Activity source that can be switched offline
pub struct FlakySource {
    pub inner: Library,
    pub offline: AtomicBool,
}

impl FlakySource {
    pub fn new(inner: Library) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl ActivitySource for FlakySource {
    fn user_exists(&self, user: UserId) -> Result<bool, SourceError> {
        self.inner.user_exists(user)
    }

    fn count_activity(&self, user: UserId, scope: Option<GenreId>) -> Result<i64, SourceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err("activity store offline".into());
        }
        self.inner.count_activity(user, scope)
    }
}
