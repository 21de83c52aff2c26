use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use libris::library::NewBook;

mod cli;
mod commands;

use commands::{
    AchievementCommands, BookCommands, Commands, GenreCommands, ShelfCommands, UserCommands,
};

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Reading catalog with achievements")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.libris/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    if let Commands::Init { force } = cli.command {
        return cli::init::init_command(config_path, force).await;
    }

    let libris = cli::open(config_path)?;

    match cli.command {
        // Handled before the database is opened
        Commands::Init { .. } => {}
        Commands::User { command } => match command {
            UserCommands::Add { login, email } => {
                cli::library::user_add_command(&libris, &login, &email)?;
            }
            UserCommands::List { json } => cli::library::user_list_command(&libris, json)?,
            UserCommands::Get { login, json } => {
                cli::library::user_get_command(&libris, &login, json)?;
            }
            UserCommands::Edit {
                login,
                new_login,
                email,
            } => cli::library::user_edit_command(&libris, &login, new_login, email)?,
            UserCommands::Delete { login } => cli::library::user_delete_command(&libris, &login)?,
        },
        Commands::Genre { command } => match command {
            GenreCommands::Add { name } => cli::library::genre_add_command(&libris, &name)?,
            GenreCommands::List { json } => cli::library::genre_list_command(&libris, json)?,
            GenreCommands::Delete { name } => cli::library::genre_delete_command(&libris, &name)?,
        },
        Commands::Book { command } => match command {
            BookCommands::Add {
                title,
                author,
                year,
                pages,
                genres,
            } => {
                let book = NewBook {
                    title,
                    author,
                    year,
                    pages,
                };
                cli::library::book_add_command(&libris, book, &genres)?;
            }
            BookCommands::List { json } => cli::library::book_list_command(&libris, json)?,
            BookCommands::Delete { title, author } => {
                cli::library::book_delete_command(&libris, &title, author.as_deref())?;
            }
        },
        Commands::Shelf { command } => match command {
            ShelfCommands::Add {
                user,
                book,
                author,
                rating,
            } => cli::library::shelf_add_command(&libris, &user, &book, author.as_deref(), rating)?,
            ShelfCommands::Remove { user, book, author } => {
                cli::library::shelf_remove_command(&libris, &user, &book, author.as_deref())?;
            }
            ShelfCommands::List { user, json } => {
                cli::library::shelf_list_command(&libris, &user, json)?;
            }
        },
        Commands::Achievement { command } => match command {
            AchievementCommands::Create {
                name,
                target,
                genre,
            } => cli::achievement::create_command(&libris, &name, target, genre.as_deref())?,
            AchievementCommands::List { json } => cli::achievement::list_command(&libris, json)?,
            AchievementCommands::Get { id, json } => {
                cli::achievement::get_command(&libris, id, json)?;
            }
            AchievementCommands::Edit {
                id,
                name,
                target,
                genre,
                no_genre,
            } => cli::achievement::edit_command(
                &libris,
                id,
                name,
                target,
                genre.as_deref(),
                no_genre,
            )?,
            AchievementCommands::Delete { id } => cli::achievement::delete_command(&libris, id)?,
            AchievementCommands::Earned { user, json } => {
                cli::achievement::earned_command(&libris, &user, json)?;
            }
            AchievementCommands::Resync { user, all } => {
                cli::achievement::resync_command(&libris, user.as_deref(), all).await?;
            }
        },
    }

    Ok(())
}
