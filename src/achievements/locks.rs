//! Per-user mutual exclusion for resyncs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::library::UserId;

/// Registry of per-user locks
///
/// Work for one user runs one call at a time; different users never wait on
/// each other. Entries are dropped once no caller holds or waits on them.
#[derive(Default)]
pub struct UserLocks {
    slots: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding `user`'s lock
    pub fn with_user<T>(&self, user: UserId, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(user).or_default())
        };

        let result = {
            let _held = slot.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Clones are taken and released only under `slots`, so a count of two
        // (map + us) means nobody else holds or waits on this user
        if Arc::strong_count(&slot) == 2 {
            slots.remove(&user);
        }
        drop(slot);
        drop(slots);
        result
    }

    /// Number of users with a resync running or queued
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_same_user_is_serialized() {
        let locks = UserLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    locks.with_user(1, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_different_users_run_in_parallel() {
        let locks = UserLocks::new();
        // Both closures must be inside at once for the barrier to release
        let barrier = Barrier::new(2);

        std::thread::scope(|s| {
            for user in [1, 2] {
                let locks = &locks;
                let barrier = &barrier;
                s.spawn(move || locks.with_user(user, || barrier.wait()));
            }
        });

        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_contended_user_leaves_no_entry() {
        let locks = UserLocks::new();
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..200 {
                        locks.with_user(7, std::hint::spin_loop);
                    }
                });
            }
        });
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_returns_closure_value() {
        let locks = UserLocks::new();
        assert_eq!(locks.with_user(3, || 42), 42);
    }
}
