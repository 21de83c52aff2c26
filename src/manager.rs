//! Central manager tying the library to the achievement engine

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::achievements::{
    AchievementDefinition, AchievementError, AchievementEvent, ActivitySource, Catalog,
    DecisionEngine, Ledger,
};
use crate::config::{Config, SeedAchievement};
use crate::library::{BookId, GenreId, Library, LibraryError, UserId};
use crate::store::Database;

/// Result of a library mutation that committed
///
/// The mutation itself succeeded; `resync` reports whether the user's
/// achievements were brought up to date. On `Err` the achievements stay stale
/// until a later [`Libris::resync_user`] succeeds.
#[derive(Debug)]
pub struct LibraryUpdate {
    pub user: UserId,
    pub resync: Result<Vec<AchievementEvent>, AchievementError>,
}

impl LibraryUpdate {
    /// Events from a successful resync, empty when the resync failed
    pub fn events(&self) -> &[AchievementEvent] {
        self.resync.as_deref().unwrap_or_default()
    }
}

/// Thread-safe handle over the library, catalog, ledger and engine
#[derive(Clone)]
pub struct Libris {
    db: Database,
    library: Library,
    engine: DecisionEngine,
}

impl Libris {
    /// Open the database named by `config` and apply any new seed achievements
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.database_path();
        let db = Database::open_with_timeout(&path, config.settings.busy_timeout())?;
        let libris = Self::from_db(db);
        libris
            .apply_seed(&config.achievements)
            .context("Failed to apply seed achievements")?;
        Ok(libris)
    }

    /// Open a database at a custom path, without seeding
    pub fn with_path(path: &Path) -> Result<Self> {
        Ok(Self::from_db(Database::open(path)?))
    }

    pub fn from_db(db: Database) -> Self {
        let library = Library::new(db.clone());
        let source = Arc::new(library.clone());
        Self::from_parts(db, library, source)
    }

    /// Build over a database with the engine reading activity from `source`
    ///
    /// Mutations still go through `library`; only the engine's counts come
    /// from `source`.
    pub fn from_parts(db: Database, library: Library, source: Arc<dyn ActivitySource>) -> Self {
        let engine = DecisionEngine::new(Catalog::new(db.clone()), Ledger::new(db.clone()), source);
        Self { db, library, engine }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    pub fn ledger(&self) -> &Ledger {
        self.engine.ledger()
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Put a book on a user's shelf, then resync their achievements
    pub fn add_to_library(
        &self,
        user: UserId,
        book: BookId,
        rating: Option<u8>,
    ) -> Result<LibraryUpdate, LibraryError> {
        self.library.add_entry(user, book, rating)?;
        Ok(self.after_mutation(user))
    }

    /// Take a book off a user's shelf, then resync their achievements
    pub fn remove_from_library(&self, user: UserId, book: BookId) -> Result<LibraryUpdate, LibraryError> {
        self.library.remove_entry(user, book)?;
        Ok(self.after_mutation(user))
    }

    /// Delete a book, then resync every user who had it on their shelf
    ///
    /// Returns one update per affected user, ordered by user id.
    pub fn delete_book(&self, book: BookId) -> Result<Vec<LibraryUpdate>, LibraryError> {
        let holders = self.library.delete_book(book)?;
        Ok(holders.into_iter().map(|user| self.after_mutation(user)).collect())
    }

    /// Delete a genre that no achievement is scoped to
    ///
    /// Scoped counts only ever look at their own genre, so no resync is needed.
    pub fn delete_genre(&self, genre: GenreId) -> Result<(), LibraryError> {
        self.library.delete_genre(genre)
    }

    /// Delete a user together with their shelf and earned achievements
    pub fn delete_user(&self, user: UserId) -> Result<(), LibraryError> {
        // Waits out a resync in flight so it cannot write for a deleted user
        self.engine.with_user_lock(user, || self.library.delete_user(user))
    }

    fn after_mutation(&self, user: UserId) -> LibraryUpdate {
        let resync = self.engine.resync_user(user);
        if let Err(e) = &resync {
            warn!(user_id = user, error = %e, "achievement resync failed; achievements stale until next resync");
        }
        LibraryUpdate { user, resync }
    }

    pub fn resync_user(&self, user: UserId) -> Result<Vec<AchievementEvent>, AchievementError> {
        self.engine.resync_user(user)
    }

    /// Resync every user, e.g. after a target was edited.
    ///
    /// Users are resynced on the blocking pool in parallel. Keeps going past
    /// failures and returns the outcome per user, ordered by user id.
    pub async fn resync_all(&self) -> Result<Vec<(UserId, Result<Vec<AchievementEvent>, AchievementError>)>> {
        let users = self.library.user_ids()?;
        let mut tasks = JoinSet::new();
        for user in users {
            let engine = self.engine.clone();
            tasks.spawn_blocking(move || (user, engine.resync_user(user)));
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.context("Resync task panicked")?);
        }
        results.sort_by_key(|(user, _)| *user);

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(users = results.len(), failed, "resynced all users");
        Ok(results)
    }

    pub fn earned_achievements(&self, user: UserId) -> Result<Vec<AchievementDefinition>, AchievementError> {
        self.ledger().list_for_user(user)
    }

    /// Create configured achievements whose seed has not been applied before
    ///
    /// A seed is applied at most once per database. Deleting or renaming a
    /// seeded definition afterwards is permanent.
    pub fn apply_seed(&self, seed: &[SeedAchievement]) -> Result<usize> {
        let mut created = 0;
        for entry in seed {
            if self.catalog().is_seeded(&entry.name)? {
                continue;
            }
            let scope = match &entry.genre {
                Some(genre) => Some(self.library.ensure_genre(genre)?),
                None => None,
            };
            let new = self
                .catalog()
                .seed(&entry.name, entry.target, scope)
                .with_context(|| format!("Invalid seed achievement '{}'", entry.name))?;
            if new.is_some() {
                created += 1;
            }
        }
        if created > 0 {
            info!(created, "seed achievements applied");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::NewBook;
    use tempfile::tempdir;

    #[test]
    fn test_libris_roundtrip() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();

        let user = libris.library().create_user("anna", "anna@example.com").unwrap();
        let book = libris.library().create_book(&NewBook::titled("Dune")).unwrap();
        libris.catalog().create("Reader I", 1, None).unwrap();

        let update = libris.add_to_library(user, book, None).unwrap();
        assert_eq!(update.events().len(), 1);
        assert!(matches!(update.events()[0], AchievementEvent::Granted(_)));

        let earned = libris.earned_achievements(user).unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].name, "Reader I");
    }

    #[test]
    fn test_failed_mutation_skips_resync() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();
        let user = libris.library().create_user("anna", "anna@example.com").unwrap();

        let err = libris.remove_from_library(user, 1).unwrap_err();
        assert!(matches!(err, LibraryError::NotInLibrary { .. }));
    }

    #[test]
    fn test_apply_seed_with_genre() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();
        let seed = vec![
            SeedAchievement { name: "Reader I".into(), target: 1, genre: None },
            SeedAchievement { name: "Dragon Rider".into(), target: 3, genre: Some("Fantasy".into()) },
        ];

        assert_eq!(libris.apply_seed(&seed).unwrap(), 2);
        assert_eq!(libris.apply_seed(&seed).unwrap(), 0);

        let fantasy = libris.library().genre_by_name("Fantasy").unwrap();
        let rider = libris.catalog().find_by_name("Dragon Rider").unwrap().unwrap();
        assert_eq!(rider.category_scope, Some(fantasy.id));
    }

    #[tokio::test]
    async fn test_resync_all_after_target_edit() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();
        let lib = libris.library();
        let anna = lib.create_user("anna", "anna@example.com").unwrap();
        let boris = lib.create_user("boris", "boris@example.com").unwrap();
        let dune = lib.create_book(&NewBook::titled("Dune")).unwrap();
        let emma = lib.create_book(&NewBook::titled("Emma")).unwrap();
        let reader = libris.catalog().create("Reader", 1, None).unwrap();

        libris.add_to_library(anna, dune, None).unwrap();
        libris.add_to_library(boris, dune, None).unwrap();
        libris.add_to_library(boris, emma, None).unwrap();
        assert_eq!(libris.earned_achievements(anna).unwrap().len(), 1);
        assert!(libris.earned_achievements(boris).unwrap().is_empty());

        // Editing the target leaves the ledger stale until a resync
        libris
            .catalog()
            .update(reader, &crate::achievements::DefinitionPatch { target: Some(2), ..Default::default() })
            .unwrap();
        assert_eq!(libris.earned_achievements(anna).unwrap().len(), 1);

        let results = libris.resync_all().await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, anna);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(libris.earned_achievements(anna).unwrap().is_empty());
        assert_eq!(libris.earned_achievements(boris).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_seed_deletes_and_renames() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_defaults();
        config.settings.database_path = Some(dir.path().join("libris.db"));

        {
            let libris = Libris::open(&config).unwrap();
            let catalog = libris.catalog();
            let first = catalog.find_by_name("Reader I").unwrap().unwrap();
            let second = catalog.find_by_name("Reader II").unwrap().unwrap();
            catalog.delete(first.id).unwrap();
            catalog
                .update(
                    second.id,
                    &crate::achievements::DefinitionPatch { name: Some("Bookworm".into()), ..Default::default() },
                )
                .unwrap();
        }

        let libris = Libris::open(&config).unwrap();
        let names: Vec<String> = libris.catalog().list().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Bookworm", "Reader III"]);

        // New seeds added to the config later are still applied
        config.achievements.push(SeedAchievement { name: "Reader IV".into(), target: 100, genre: None });
        let libris = Libris::open(&config).unwrap();
        assert!(libris.catalog().find_by_name("Reader IV").unwrap().is_some());
        assert!(libris.catalog().find_by_name("Reader I").unwrap().is_none());
    }

    #[test]
    fn test_delete_book_resyncs_holders() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();
        let lib = libris.library();
        let anna = lib.create_user("anna", "anna@example.com").unwrap();
        let boris = lib.create_user("boris", "boris@example.com").unwrap();
        let carl = lib.create_user("carl", "carl@example.com").unwrap();
        let dune = lib.create_book(&NewBook::titled("Dune")).unwrap();
        let emma = lib.create_book(&NewBook::titled("Emma")).unwrap();
        libris.catalog().create("Reader I", 1, None).unwrap();

        libris.add_to_library(anna, dune, None).unwrap();
        libris.add_to_library(boris, dune, None).unwrap();
        libris.add_to_library(boris, emma, None).unwrap();
        libris.add_to_library(carl, emma, None).unwrap();

        let updates = libris.delete_book(dune).unwrap();
        let users: Vec<UserId> = updates.iter().map(|u| u.user).collect();
        assert_eq!(users, vec![anna, boris]);

        // anna drops to zero, boris drops to exactly one
        assert!(matches!(updates[0].events(), [AchievementEvent::Revoked(_)]));
        assert!(matches!(updates[1].events(), [AchievementEvent::Granted(_)]));
        assert!(libris.earned_achievements(anna).unwrap().is_empty());
        assert_eq!(libris.earned_achievements(boris).unwrap().len(), 1);
        assert_eq!(libris.earned_achievements(carl).unwrap().len(), 1);

        assert!(matches!(libris.delete_book(dune), Err(LibraryError::BookNotFound(_))));
    }

    #[test]
    fn test_delete_user_drops_earned() {
        let dir = tempdir().unwrap();
        let libris = Libris::with_path(&dir.path().join("libris.db")).unwrap();
        let anna = libris.library().create_user("anna", "anna@example.com").unwrap();
        let dune = libris.library().create_book(&NewBook::titled("Dune")).unwrap();
        let id = libris.catalog().create("Reader I", 1, None).unwrap();
        libris.add_to_library(anna, dune, None).unwrap();
        assert_eq!(libris.ledger().holder_count(id).unwrap(), 1);

        libris.delete_user(anna).unwrap();

        assert_eq!(libris.ledger().holder_count(id).unwrap(), 0);
        assert!(matches!(
            libris.resync_user(anna),
            Err(AchievementError::NotFound(crate::achievements::Missing::User(_)))
        ));
        assert!(matches!(libris.delete_user(anna), Err(LibraryError::UserNotFound(_))));
    }

    #[test]
    fn test_open_from_config() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_defaults();
        config.settings.database_path = Some(dir.path().join("data/libris.db"));

        let libris = Libris::open(&config).unwrap();
        assert_eq!(libris.catalog().list().unwrap().len(), config.achievements.len());
    }
}
