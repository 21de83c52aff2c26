//! CLI command implementations

pub mod achievement;
pub mod init;
pub mod library;

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use libris::Libris;
use libris::config::Config;

/// Load the config (global unless overridden) and open the database it names
pub fn open(config_path: Option<&Path>) -> Result<Libris> {
    let config = Config::load(config_path)?;
    Libris::open(&config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
