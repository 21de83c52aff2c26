//! User, genre, book and shelf commands

use anyhow::Result;

use libris::library::{NewBook, UserPatch};
use libris::{Libris, LibraryUpdate};

use super::print_json;

pub fn user_add_command(libris: &Libris, login: &str, email: &str) -> Result<()> {
    let id = libris.library().create_user(login, email)?;
    println!("Registered user #{id} ({login})");
    Ok(())
}

pub fn user_list_command(libris: &Libris, json: bool) -> Result<()> {
    let users = libris.library().list_users()?;
    if json {
        return print_json(&users);
    }
    for user in users {
        println!("#{:<4} {} <{}>", user.id, user.login, user.email);
    }
    Ok(())
}

pub fn user_get_command(libris: &Libris, login: &str, json: bool) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    if json {
        return print_json(&user);
    }
    let books = libris.library().count_books(user.id, None)?;
    let earned = libris.earned_achievements(user.id)?;
    println!("#{} {} <{}>", user.id, user.login, user.email);
    println!("  books:        {books}");
    println!("  achievements: {}", earned.len());
    Ok(())
}

pub fn user_edit_command(
    libris: &Libris,
    login: &str,
    new_login: Option<String>,
    email: Option<String>,
) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    let patch = UserPatch { login: new_login, email };
    if patch.login.is_none() && patch.email.is_none() {
        println!("Nothing to change.");
        return Ok(());
    }
    let user = libris.library().update_user(user.id, &patch)?;
    println!("Updated user #{} ({} <{}>)", user.id, user.login, user.email);
    Ok(())
}

pub fn user_delete_command(libris: &Libris, login: &str) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    libris.delete_user(user.id)?;
    println!("Deleted user #{} ({})", user.id, user.login);
    Ok(())
}

pub fn genre_add_command(libris: &Libris, name: &str) -> Result<()> {
    let id = libris.library().create_genre(name)?;
    println!("Created genre #{id} ({name})");
    Ok(())
}

pub fn genre_list_command(libris: &Libris, json: bool) -> Result<()> {
    let genres = libris.library().list_genres()?;
    if json {
        return print_json(&genres);
    }
    for genre in genres {
        println!("#{:<4} {}", genre.id, genre.name);
    }
    Ok(())
}

pub fn genre_delete_command(libris: &Libris, name: &str) -> Result<()> {
    let genre = libris.library().genre_by_name(name)?;
    libris.delete_genre(genre.id)?;
    println!("Deleted genre #{} ({})", genre.id, genre.name);
    Ok(())
}

pub fn book_add_command(libris: &Libris, book: NewBook, genres: &[String]) -> Result<()> {
    let library = libris.library();
    let id = library.create_book(&book)?;
    for name in genres {
        let genre = library.ensure_genre(name)?;
        library.tag_book(id, genre)?;
    }
    println!("Registered book #{id} ({})", book.title.trim());
    Ok(())
}

pub fn book_list_command(libris: &Libris, json: bool) -> Result<()> {
    let books = libris.library().list_books()?;
    if json {
        return print_json(&books);
    }
    if books.is_empty() {
        println!("No books found.");
        return Ok(());
    }
    for book in books {
        let genres: Vec<String> = libris
            .library()
            .book_genres(book.id)?
            .into_iter()
            .map(|g| g.name)
            .collect();
        let author = if book.author.is_empty() { "unknown author" } else { book.author.as_str() };
        println!("#{:<4} {} ({author})", book.id, book.title);
        if !genres.is_empty() {
            println!("      {}", genres.join(", "));
        }
    }
    Ok(())
}

pub fn book_delete_command(libris: &Libris, title: &str, author: Option<&str>) -> Result<()> {
    let book = libris.library().book_by_title(title, author)?;
    let updates = libris.delete_book(book.id)?;
    println!("Deleted book #{} ({}); {} shelves affected", book.id, book.title, updates.len());
    for update in &updates {
        report_update(update);
    }
    Ok(())
}

pub fn shelf_add_command(
    libris: &Libris,
    login: &str,
    title: &str,
    author: Option<&str>,
    rating: Option<u8>,
) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    let book = libris.library().book_by_title(title, author)?;
    let update = libris.add_to_library(user.id, book.id, rating)?;
    println!("Added '{}' to {}'s shelf", book.title, user.login);
    report_update(&update);
    Ok(())
}

pub fn shelf_remove_command(libris: &Libris, login: &str, title: &str, author: Option<&str>) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    let book = libris.library().book_by_title(title, author)?;
    let update = libris.remove_from_library(user.id, book.id)?;
    println!("Removed '{}' from {}'s shelf", book.title, user.login);
    report_update(&update);
    Ok(())
}

pub fn shelf_list_command(libris: &Libris, login: &str, json: bool) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    let entries = libris.library().entries_for_user(user.id)?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("{}'s shelf is empty.", user.login);
        return Ok(());
    }
    println!("{}'s shelf ({}):\n", user.login, entries.len());
    for entry in entries {
        match entry.rating {
            Some(r) => println!("  {} [{}/5]", entry.book.title, r),
            None => println!("  {}", entry.book.title),
        }
    }
    Ok(())
}

/// Print what the resync after a shelf change did. A failed resync is not an
/// error for the command: the shelf change already happened.
fn report_update(update: &LibraryUpdate) {
    match &update.resync {
        Ok(events) => super::achievement::print_events(events),
        Err(e) => eprintln!(
            "Warning: achievements for user #{} not updated ({e}); run `libris achievement resync` later",
            update.user
        ),
    }
}
