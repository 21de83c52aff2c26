//! Persistent storage shared by the library and the achievement engine

mod db;

pub use db::{is_unique_violation, now_ms, Database};
