//! Reading library: users, books, genres and each user's shelf
//!
//! This is the activity source the achievement engine reads from. Mutations
//! here never touch achievements directly; callers go through
//! [`crate::Libris`] so that a resync follows every committed change.

mod models;

pub use models::{Book, BookId, Genre, GenreId, LibraryEntry, NewBook, User, UserId, UserPatch};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::info;

use crate::achievements::{ActivitySource, SourceError};
use crate::store::{Database, is_unique_violation, now_ms};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Genre not found: {0}")]
    GenreNotFound(String),

    #[error("Login or email already registered: {0}")]
    DuplicateLogin(String),

    #[error("Genre already exists: {0}")]
    DuplicateGenre(String),

    #[error("Book already exists: {0}")]
    DuplicateBook(String),

    #[error("{count} books are titled '{title}'; pass the author to pick one")]
    AmbiguousBook { title: String, count: usize },

    #[error("Genre '{genre}' is the scope of {achievements} achievement(s)")]
    GenreInUse { genre: String, achievements: i64 },

    #[error("Book {book} is already in the library of user {user}")]
    AlreadyInLibrary { user: UserId, book: BookId },

    #[error("Book {book} is not in the library of user {user}")]
    NotInLibrary { user: UserId, book: BookId },

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Field must not be empty: {0}")]
    InvalidField(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

/// Read/write access to library data
#[derive(Clone)]
pub struct Library {
    db: Database,
}

impl Library {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================
    // USERS
    // ========================================

    /// Register a user. Login and email must both be unused.
    pub fn create_user(&self, login: &str, email: &str) -> Result<UserId> {
        let login = non_empty(login, "login")?;
        let email = non_empty(email, "email")?;

        let conn = self.db.conn();
        match conn.execute(
            "INSERT INTO users (login, email, created_at) VALUES (?1, ?2, ?3)",
            params![login, email, now_ms()],
        ) {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                info!(user_id = id, login, "user registered");
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => Err(LibraryError::DuplicateLogin(login.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by id
    pub fn get_user(&self, id: UserId) -> Result<User> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, login, email FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| LibraryError::UserNotFound(id.to_string()))
    }

    /// Get a user by login
    pub fn user_by_login(&self, login: &str) -> Result<User> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, login, email FROM users WHERE login = ?1",
            [login],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| LibraryError::UserNotFound(login.to_string()))
    }

    /// All users, ordered by login
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id, login, email FROM users ORDER BY login")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Ids of every user, ascending
    pub fn user_ids(&self) -> Result<Vec<UserId>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Change a user's login or email
    pub fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User> {
        let mut user = self.get_user(id)?;
        if let Some(login) = &patch.login {
            user.login = non_empty(login, "login")?.to_string();
        }
        if let Some(email) = &patch.email {
            user.email = non_empty(email, "email")?.to_string();
        }

        let conn = self.db.conn();
        let updated = conn.execute(
            "UPDATE users SET login = ?1, email = ?2 WHERE id = ?3",
            params![user.login, user.email, id],
        );
        match updated {
            Ok(0) => Err(LibraryError::UserNotFound(id.to_string())),
            Ok(_) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(LibraryError::DuplicateLogin(user.login)),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a user. Their shelf and earned achievements go with them.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        let conn = self.db.conn();
        if conn.execute("DELETE FROM users WHERE id = ?1", [id])? == 0 {
            return Err(LibraryError::UserNotFound(id.to_string()));
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }

    // ========================================
    // GENRES
    // ========================================

    /// Register a genre under a unique name
    pub fn create_genre(&self, name: &str) -> Result<GenreId> {
        let name = non_empty(name, "genre name")?;
        let conn = self.db.conn();
        match conn.execute("INSERT INTO genres (name) VALUES (?1)", [name]) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(LibraryError::DuplicateGenre(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn genre_by_name(&self, name: &str) -> Result<Genre> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, name FROM genres WHERE name = ?1",
            [name],
            |r| Ok(Genre { id: r.get(0)?, name: r.get(1)? }),
        )
        .optional()?
        .ok_or_else(|| LibraryError::GenreNotFound(name.to_string()))
    }

    /// Look up a genre by name, creating it when missing
    pub fn ensure_genre(&self, name: &str) -> Result<GenreId> {
        match self.genre_by_name(name) {
            Ok(genre) => Ok(genre.id),
            Err(LibraryError::GenreNotFound(_)) => self.create_genre(name),
            Err(e) => Err(e),
        }
    }

    /// All genres, ordered by name
    pub fn list_genres(&self) -> Result<Vec<Genre>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id, name FROM genres ORDER BY name")?;
        let genres = stmt
            .query_map([], |r| Ok(Genre { id: r.get(0)?, name: r.get(1)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(genres)
    }

    /// Delete a genre and its book tags.
    ///
    /// Refused while an achievement is scoped to the genre; removing the scope
    /// would silently turn that achievement into a global one.
    pub fn delete_genre(&self, id: GenreId) -> Result<()> {
        let mut conn = self.db.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let name: String = tx
            .query_row("SELECT name FROM genres WHERE id = ?1", [id], |r| r.get(0))
            .optional()?
            .ok_or_else(|| LibraryError::GenreNotFound(id.to_string()))?;
        let achievements: i64 = tx.query_row(
            "SELECT COUNT(*) FROM achievements WHERE category_scope = ?1",
            [id],
            |r| r.get(0),
        )?;
        if achievements > 0 {
            return Err(LibraryError::GenreInUse { genre: name, achievements });
        }
        tx.execute("DELETE FROM genres WHERE id = ?1", [id])?;
        tx.commit()?;
        info!(genre_id = id, genre = %name, "genre deleted");
        Ok(())
    }

    // ========================================
    // BOOKS
    // ========================================

    /// Register a book. Title and author together must be unique.
    pub fn create_book(&self, book: &NewBook) -> Result<BookId> {
        let title = non_empty(&book.title, "title")?;
        let author = book.author.as_deref().map(str::trim).unwrap_or_default();

        let conn = self.db.conn();
        match conn.execute(
            "INSERT INTO books (title, author, year, pages) VALUES (?1, ?2, ?3, ?4)",
            params![title, author, book.year, book.pages],
        ) {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                info!(book_id = id, title, "book registered");
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => Err(LibraryError::DuplicateBook(title.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a book by id
    pub fn get_book(&self, id: BookId) -> Result<Book> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, title, author, year, pages FROM books WHERE id = ?1",
            [id],
            book_from_row,
        )
        .optional()?
        .ok_or_else(|| LibraryError::BookNotFound(id.to_string()))
    }

    /// Find a book by title, narrowed by author when given.
    ///
    /// Without an author the title must name exactly one book.
    pub fn book_by_title(&self, title: &str, author: Option<&str>) -> Result<Book> {
        let conn = self.db.conn();
        if let Some(author) = author {
            return conn
                .query_row(
                    "SELECT id, title, author, year, pages FROM books WHERE title = ?1 AND author = ?2",
                    [title, author.trim()],
                    book_from_row,
                )
                .optional()?
                .ok_or_else(|| LibraryError::BookNotFound(format!("{title} by {author}")));
        }

        let mut stmt = conn.prepare(
            "SELECT id, title, author, year, pages FROM books WHERE title = ?1 ORDER BY id",
        )?;
        let mut books = stmt
            .query_map([title], book_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        match books.len() {
            0 => Err(LibraryError::BookNotFound(title.to_string())),
            1 => Ok(books.remove(0)),
            count => Err(LibraryError::AmbiguousBook {
                title: title.to_string(),
                count,
            }),
        }
    }

    /// All books, ordered by title
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT id, title, author, year, pages FROM books ORDER BY title, id")?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(books)
    }

    /// Tag a book with a genre. Tagging twice is a no-op.
    pub fn tag_book(&self, book: BookId, genre: GenreId) -> Result<()> {
        let conn = self.db.conn();
        ensure_book(&conn, book)?;
        ensure_genre_id(&conn, genre)?;
        conn.execute(
            "INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?1, ?2)",
            [book, genre],
        )?;
        Ok(())
    }

    /// Remove a genre tag. Removing a missing tag is a no-op.
    pub fn untag_book(&self, book: BookId, genre: GenreId) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "DELETE FROM book_genres WHERE book_id = ?1 AND genre_id = ?2",
            [book, genre],
        )?;
        Ok(())
    }

    /// Genres a book is tagged with, ordered by name
    pub fn book_genres(&self, book: BookId) -> Result<Vec<Genre>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT g.id, g.name FROM genres g
             JOIN book_genres bg ON bg.genre_id = g.id
             WHERE bg.book_id = ?1 ORDER BY g.name",
        )?;
        let genres = stmt
            .query_map([book], |r| Ok(Genre { id: r.get(0)?, name: r.get(1)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(genres)
    }

    /// Delete a book, taking it off every shelf.
    ///
    /// Returns the users who had it, ascending; their counts changed.
    pub fn delete_book(&self, id: BookId) -> Result<Vec<UserId>> {
        let mut conn = self.db.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_book(&tx, id)?;
        let holders = {
            let mut stmt =
                tx.prepare("SELECT user_id FROM user_books WHERE book_id = ?1 ORDER BY user_id")?;
            let holders = stmt
                .query_map([id], |r| r.get(0))?
                .collect::<rusqlite::Result<Vec<UserId>>>()?;
            holders
        };
        tx.execute("DELETE FROM books WHERE id = ?1", [id])?;
        tx.commit()?;
        info!(book_id = id, holders = holders.len(), "book deleted");
        Ok(holders)
    }

    // ========================================
    // SHELF
    // ========================================

    /// Put a book in a user's library
    pub fn add_entry(&self, user: UserId, book: BookId, rating: Option<u8>) -> Result<()> {
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(LibraryError::InvalidRating(r));
            }
        }

        let conn = self.db.conn();
        ensure_user(&conn, user)?;
        ensure_book(&conn, book)?;
        match conn.execute(
            "INSERT INTO user_books (user_id, book_id, rating, added_at) VALUES (?1, ?2, ?3, ?4)",
            params![user, book, rating, now_ms()],
        ) {
            Ok(_) => {
                info!(user_id = user, book_id = book, "book added to library");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(LibraryError::AlreadyInLibrary { user, book }),
            Err(e) => Err(e.into()),
        }
    }

    /// Take a book out of a user's library
    pub fn remove_entry(&self, user: UserId, book: BookId) -> Result<()> {
        let conn = self.db.conn();
        ensure_user(&conn, user)?;
        let removed = conn.execute(
            "DELETE FROM user_books WHERE user_id = ?1 AND book_id = ?2",
            [user, book],
        )?;
        if removed == 0 {
            return Err(LibraryError::NotInLibrary { user, book });
        }
        info!(user_id = user, book_id = book, "book removed from library");
        Ok(())
    }

    /// Books in a user's library with their ratings, ordered by title
    pub fn entries_for_user(&self, user: UserId) -> Result<Vec<LibraryEntry>> {
        let conn = self.db.conn();
        ensure_user(&conn, user)?;
        let mut stmt = conn.prepare(
            "SELECT b.id, b.title, b.author, b.year, b.pages, ub.rating, ub.added_at
             FROM user_books ub JOIN books b ON b.id = ub.book_id
             WHERE ub.user_id = ?1 ORDER BY b.title, b.id",
        )?;
        let entries = stmt
            .query_map([user], |r| {
                Ok(LibraryEntry {
                    book: book_from_row(r)?,
                    rating: r.get(5)?,
                    added_at: r.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of distinct books in `user`'s library, optionally only those tagged `genre`
    pub fn count_books(&self, user: UserId, genre: Option<GenreId>) -> Result<i64> {
        let conn = self.db.conn();
        let count = match genre {
            None => conn.query_row(
                "SELECT COUNT(DISTINCT book_id) FROM user_books WHERE user_id = ?1",
                [user],
                |r| r.get(0),
            )?,
            // EXISTS keeps a book with several tags from being counted twice
            Some(genre) => conn.query_row(
                "SELECT COUNT(DISTINCT ub.book_id) FROM user_books ub
                 WHERE ub.user_id = ?1
                   AND EXISTS (SELECT 1 FROM book_genres bg
                               WHERE bg.book_id = ub.book_id AND bg.genre_id = ?2)",
                [user, genre],
                |r| r.get(0),
            )?,
        };
        Ok(count)
    }
}

impl ActivitySource for Library {
    fn user_exists(&self, user: UserId) -> std::result::Result<bool, SourceError> {
        let conn = self.db.conn();
        Ok(row_exists(&conn, "SELECT 1 FROM users WHERE id = ?1", user)?)
    }

    fn count_activity(
        &self,
        user: UserId,
        scope: Option<GenreId>,
    ) -> std::result::Result<i64, SourceError> {
        Ok(self.count_books(user, scope)?)
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidField(field));
    }
    Ok(trimmed)
}

fn row_exists(conn: &Connection, sql: &str, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

fn ensure_user(conn: &Connection, id: UserId) -> Result<()> {
    if !row_exists(conn, "SELECT 1 FROM users WHERE id = ?1", id)? {
        return Err(LibraryError::UserNotFound(id.to_string()));
    }
    Ok(())
}

fn ensure_book(conn: &Connection, id: BookId) -> Result<()> {
    if !row_exists(conn, "SELECT 1 FROM books WHERE id = ?1", id)? {
        return Err(LibraryError::BookNotFound(id.to_string()));
    }
    Ok(())
}

fn ensure_genre_id(conn: &Connection, id: GenreId) -> Result<()> {
    if !row_exists(conn, "SELECT 1 FROM genres WHERE id = ?1", id)? {
        return Err(LibraryError::GenreNotFound(id.to_string()));
    }
    Ok(())
}

fn user_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        login: r.get(1)?,
        email: r.get(2)?,
    })
}

fn book_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: r.get(0)?,
        title: r.get(1)?,
        author: r.get(2)?,
        year: r.get(3)?,
        pages: r.get(4)?,
    })
}
