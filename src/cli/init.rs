//! Init command implementation

use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use libris::config::Config;

/// Default configuration content for libris init
pub const DEFAULT_CONFIG: &str = r#"# libris configuration
# =====================

[settings]
# SQLite database file (default: ~/.libris/libris.db)
# database_path = "~/.libris/libris.db"

# Milliseconds to wait when another process holds the database lock
busy_timeout_ms = 5000

# ============================================================================
# ACHIEVEMENTS - each created once, the first time the name is seen; deleting or
# renaming one later is permanent
# ============================================================================
#
# A user holds an achievement while the number of books on their shelf equals
# `target` exactly. With `genre`, only books tagged with that genre count.
# Editing an entry here does not change an existing achievement; use
# `libris achievement edit` for that.

[[achievement]]
name = "Reader I"
target = 1

[[achievement]]
name = "Reader II"
target = 10

[[achievement]]
name = "Reader III"
target = 50

# [[achievement]]
# name = "Dragon Rider"
# target = 3
# genre = "Fantasy"
"#;

/// Write the default config to `config_path` (or the global location)
pub async fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if path.exists() && !force {
        bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&path, DEFAULT_CONFIG)?;

    info!("Created configuration file: {}", path.display());
    println!("Created {}", path.display());
    Ok(())
}
