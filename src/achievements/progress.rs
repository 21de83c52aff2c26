//! Progress counting against the activity source

use std::sync::Arc;

use super::definitions::AchievementDefinition;
use crate::library::{GenreId, UserId};

pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Read access to users' reading activity
///
/// Implementations must answer from current state on every call; the engine
/// relies on counts never being cached between a mutation and its resync.
pub trait ActivitySource: Send + Sync {
    fn user_exists(&self, user: UserId) -> Result<bool, SourceError>;

    /// Distinct books in `user`'s library, restricted to books tagged `scope` when given
    fn count_activity(&self, user: UserId, scope: Option<GenreId>) -> Result<i64, SourceError>;
}

/// Computes how far a user is towards a definition's target
#[derive(Clone)]
pub struct ProgressCounter {
    source: Arc<dyn ActivitySource>,
}

impl ProgressCounter {
    pub fn new(source: Arc<dyn ActivitySource>) -> Self {
        Self { source }
    }

    pub fn count(&self, user: UserId, definition: &AchievementDefinition) -> Result<i64, SourceError> {
        self.source.count_activity(user, definition.category_scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// user -> list of books, each book a list of genre tags
    struct FixedShelves(HashMap<UserId, Vec<Vec<GenreId>>>);

    impl ActivitySource for FixedShelves {
        fn user_exists(&self, user: UserId) -> Result<bool, SourceError> {
            Ok(self.0.contains_key(&user))
        }

        fn count_activity(&self, user: UserId, scope: Option<GenreId>) -> Result<i64, SourceError> {
            let books = self.0.get(&user).map(Vec::as_slice).unwrap_or_default();
            let n = match scope {
                None => books.len(),
                Some(g) => books.iter().filter(|tags| tags.contains(&g)).count(),
            };
            Ok(n as i64)
        }
    }

    fn def(scope: Option<GenreId>) -> AchievementDefinition {
        AchievementDefinition {
            id: 1,
            name: "any".into(),
            target: 1,
            category_scope: scope,
        }
    }

    #[test]
    fn test_scope_selects_source_query() {
        let shelves = FixedShelves(HashMap::from([(7, vec![vec![1, 2], vec![2], vec![]])]));
        let counter = ProgressCounter::new(Arc::new(shelves));

        assert_eq!(counter.count(7, &def(None)).unwrap(), 3);
        assert_eq!(counter.count(7, &def(Some(2))).unwrap(), 2);
        assert_eq!(counter.count(7, &def(Some(1))).unwrap(), 1);
        assert_eq!(counter.count(8, &def(None)).unwrap(), 0);
    }
}
