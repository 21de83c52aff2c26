use std::fmt;

use super::definitions::{DefinitionId, MAX_NAME_LEN};
use super::progress::SourceError;
use crate::library::{GenreId, UserId};

/// What a [`AchievementError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Achievement(DefinitionId),
    User(UserId),
    Genre(GenreId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Achievement(id) => write!(f, "achievement {id}"),
            Self::User(id) => write!(f, "user {id}"),
            Self::Genre(id) => write!(f, "genre {id}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AchievementError {
    #[error("Not found: {0}")]
    NotFound(Missing),

    #[error("Achievement name already in use: {0}")]
    DuplicateName(String),

    #[error("Achievement target must be positive, got {0}")]
    InvalidTarget(i64),

    #[error("Achievement name must be between 1 and {max} characters", max = MAX_NAME_LEN)]
    InvalidName,

    #[error("Achievement engine unavailable while resyncing user {user}")]
    EngineUnavailable {
        user: UserId,
        #[source]
        source: SourceError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl AchievementError {
    pub fn unavailable(user: UserId, source: impl Into<SourceError>) -> Self {
        Self::EngineUnavailable {
            user,
            source: source.into(),
        }
    }

    /// Storage failures during a resync are reported as the engine being unavailable
    pub(crate) fn during_resync(self, user: UserId) -> Self {
        match self {
            Self::Storage(e) => Self::unavailable(user, e),
            other => other,
        }
    }

    /// True for errors a retried resync may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. } | Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, AchievementError>;
