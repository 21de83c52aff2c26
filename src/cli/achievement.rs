//! Achievement catalog and ledger commands

use anyhow::Result;

use libris::Libris;
use libris::achievements::{AchievementDefinition, AchievementEvent, DefinitionPatch};
use libris::library::GenreId;

use super::print_json;

pub fn create_command(libris: &Libris, name: &str, target: i64, genre: Option<&str>) -> Result<()> {
    let scope = resolve_genre(libris, genre)?;
    let id = libris.catalog().create(name, target, scope)?;
    println!("Created achievement #{id} ({})", name.trim());
    Ok(())
}

pub fn list_command(libris: &Libris, json: bool) -> Result<()> {
    let definitions = libris.catalog().list()?;
    if json {
        return print_json(&definitions);
    }
    if definitions.is_empty() {
        println!("No achievements defined.");
        return Ok(());
    }
    for def in &definitions {
        let holders = libris.ledger().holder_count(def.id)?;
        println!("{}  ({holders} holders)", describe(libris, def)?);
    }
    Ok(())
}

pub fn get_command(libris: &Libris, id: i64, json: bool) -> Result<()> {
    let def = libris.catalog().get(id)?;
    if json {
        return print_json(&def);
    }
    println!("{}", describe(libris, &def)?);
    Ok(())
}

pub fn edit_command(
    libris: &Libris,
    id: i64,
    name: Option<String>,
    target: Option<i64>,
    genre: Option<&str>,
    no_genre: bool,
) -> Result<()> {
    let category_scope = if no_genre {
        Some(None)
    } else if genre.is_some() {
        Some(resolve_genre(libris, genre)?)
    } else {
        None
    };
    let patch = DefinitionPatch {
        name,
        target,
        category_scope,
    };
    let def = libris.catalog().update(id, &patch)?;
    println!("Updated {}", describe(libris, &def)?);
    if patch.target.is_some() || patch.category_scope.is_some() {
        println!("Earned achievements update on each user's next resync (`libris achievement resync --all`).");
    }
    Ok(())
}

pub fn delete_command(libris: &Libris, id: i64) -> Result<()> {
    let def = libris.catalog().get(id)?;
    libris.catalog().delete(id)?;
    println!("Deleted achievement #{id} ({})", def.name);
    Ok(())
}

pub fn earned_command(libris: &Libris, login: &str, json: bool) -> Result<()> {
    let user = libris.library().user_by_login(login)?;
    let earned = libris.earned_achievements(user.id)?;
    if json {
        return print_json(&earned);
    }
    if earned.is_empty() {
        println!("{} has not earned any achievements yet.", user.login);
        return Ok(());
    }
    println!("{}'s achievements ({}):\n", user.login, earned.len());
    for def in &earned {
        println!("  {}", describe(libris, def)?);
    }
    Ok(())
}

pub async fn resync_command(libris: &Libris, login: Option<&str>, all: bool) -> Result<()> {
    if all {
        let results = libris.resync_all().await?;
        let mut failed = 0;
        for (user, result) in &results {
            match result {
                Ok(events) => print_events(events),
                Err(e) => {
                    failed += 1;
                    eprintln!("User #{user}: {e}");
                }
            }
        }
        println!("Resynced {} users ({failed} failed)", results.len());
        if failed > 0 {
            anyhow::bail!("{failed} resyncs failed");
        }
        return Ok(());
    }

    if let Some(login) = login {
        let user = libris.library().user_by_login(login)?;
        let events = libris.resync_user(user.id)?;
        print_events(&events);
        println!("Resynced {}", user.login);
    }
    Ok(())
}

pub fn print_events(events: &[AchievementEvent]) {
    for event in events {
        match event {
            AchievementEvent::Granted(def) => println!("  + earned '{}'", def.name),
            AchievementEvent::Revoked(def) => println!("  - lost '{}'", def.name),
        }
    }
}

fn resolve_genre(libris: &Libris, genre: Option<&str>) -> Result<Option<GenreId>> {
    match genre {
        Some(name) => Ok(Some(libris.library().genre_by_name(name)?.id)),
        None => Ok(None),
    }
}

fn describe(libris: &Libris, def: &AchievementDefinition) -> Result<String> {
    let scope = match def.category_scope {
        Some(genre) => {
            let name = libris
                .library()
                .list_genres()?
                .into_iter()
                .find(|g| g.id == genre)
                .map(|g| g.name)
                .unwrap_or_else(|| format!("genre #{genre}"));
            format!("{} books", name)
        }
        None => "books".to_string(),
    };
    Ok(format!("#{:<4} {} - exactly {} {}", def.id, def.name, def.target, scope))
}
