//! libris - a reading catalog with achievements
//!
//! Users keep books on their shelves; administrators define achievements such
//! as "have exactly 10 books" or "have 3 fantasy books". Every time a shelf
//! changes, the decision engine re-evaluates the catalog for that user and
//! grants or revokes earned achievements so the ledger matches the shelf.
//!
//! ## Usage
//!
//! ```ignore
//! let libris = Libris::with_path(Path::new("libris.db"))?;
//! let user = libris.library().create_user("anna", "anna@example.com")?;
//! let book = libris.library().create_book(&NewBook::titled("Dune"))?;
//! libris.catalog().create("Reader I", 1, None)?;
//!
//! let update = libris.add_to_library(user, book, Some(5))?;
//! for event in update.events() { println!("{event:?}"); }
//! ```

pub mod achievements;
pub mod config;
pub mod library;
pub mod manager;
pub mod store;

pub use manager::{Libris, LibraryUpdate};
