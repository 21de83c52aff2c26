//! Achievement definitions and metadata

use serde::{Deserialize, Serialize};

use crate::library::GenreId;

pub type DefinitionId = i64;

/// Longest accepted achievement name, in characters
pub const MAX_NAME_LEN: usize = 50;

/// An administrator-defined achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: DefinitionId,
    pub name: String,
    /// Number of qualifying books required
    pub target: i64,
    /// Only books tagged with this genre count when set
    pub category_scope: Option<GenreId>,
}

impl AchievementDefinition {
    /// Award predicate: the count must hit the target exactly.
    ///
    /// A user who moves past the target (in either direction) no longer holds
    /// the achievement on the next resync.
    pub fn is_met_by(&self, count: i64) -> bool {
        count == self.target
    }
}

/// Partial update for [`super::Catalog::update`]
///
/// `category_scope: Some(None)` clears the scope, `None` leaves it unchanged.
#[derive(Debug, Clone, Default)]
pub struct DefinitionPatch {
    pub name: Option<String>,
    pub target: Option<i64>,
    pub category_scope: Option<Option<GenreId>>,
}

impl DefinitionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.target.is_none() && self.category_scope.is_none()
    }
}
