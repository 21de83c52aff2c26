//! Data models for the reading library
//!
//! These structures mirror the rows stored in the `users`, `genres`, `books`
//! and `user_books` tables.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type BookId = i64;
pub type GenreId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    /// Empty when unknown
    pub author: String,
    pub year: Option<i32>,
    pub pages: Option<i32>,
}

/// Input for [`super::Library::create_book`]
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub pages: Option<i32>,
}

impl NewBook {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Changes for [`super::Library::update_user`]; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub login: Option<String>,
    pub email: Option<String>,
}

/// One book in a user's library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub book: Book,
    /// 1..=5 when the user rated the book
    pub rating: Option<u8>,
    /// Milliseconds since epoch
    pub added_at: i64,
}
