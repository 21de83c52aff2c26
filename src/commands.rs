//! CLI command definitions for libris.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ~/.libris/config.toml configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage genres
    Genre {
        #[command(subcommand)]
        command: GenreCommands,
    },

    /// Manage books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },

    /// Add or remove books from a user's shelf
    Shelf {
        #[command(subcommand)]
        command: ShelfCommands,
    },

    /// Manage achievement definitions and earned achievements
    Achievement {
        #[command(subcommand)]
        command: AchievementCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user
    Add { login: String, email: String },
    /// List users
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one user
    Get {
        login: String,
        #[arg(long)]
        json: bool,
    },
    /// Change a user's login or email
    Edit {
        login: String,
        #[arg(long = "login")]
        new_login: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a user with their shelf and earned achievements
    Delete { login: String },
}

#[derive(Subcommand)]
pub enum GenreCommands {
    /// Create a genre
    Add { name: String },
    /// List genres
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a genre no achievement is scoped to
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum BookCommands {
    /// Register a book
    Add {
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        pages: Option<i32>,
        /// Genre to tag the book with (repeatable, created if missing)
        #[arg(long = "genre")]
        genres: Vec<String>,
    },
    /// List books
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a book and resync everyone who had it
    Delete {
        title: String,
        /// Author, when several books share the title
        #[arg(long)]
        author: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ShelfCommands {
    /// Put a book on a user's shelf
    Add {
        /// User login
        user: String,
        /// Book title
        book: String,
        /// Author, when several books share the title
        #[arg(long)]
        author: Option<String>,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,
    },
    /// Take a book off a user's shelf
    Remove {
        user: String,
        book: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Show a user's shelf
    List {
        user: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AchievementCommands {
    /// Define an achievement
    Create {
        name: String,
        /// Exact number of books required
        #[arg(allow_hyphen_values = true)]
        target: i64,
        /// Only count books in this genre
        #[arg(long)]
        genre: Option<String>,
    },
    /// List achievement definitions
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one achievement definition
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Edit an achievement definition (does not resync users)
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        target: Option<i64>,
        #[arg(long, conflicts_with = "no_genre")]
        genre: Option<String>,
        /// Remove the genre scope
        #[arg(long)]
        no_genre: bool,
    },
    /// Delete an achievement definition and every earned record of it
    Delete { id: i64 },
    /// Show the achievements a user has earned
    Earned {
        user: String,
        #[arg(long)]
        json: bool,
    },
    /// Re-evaluate achievements for one user, or all users
    Resync {
        #[arg(required_unless_present = "all")]
        user: Option<String>,
        #[arg(long, conflicts_with = "user")]
        all: bool,
    },
}
