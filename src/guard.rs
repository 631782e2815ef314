//! In-memory dedup locks.
//!
//! Acquisition never waits: a held key means the caller is a duplicate and is
//! rejected. Leases release their key on drop, so every exit path of a guarded
//! operation (including `?` and panics) frees it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// A set of keys that are currently held.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: Mutex<HashSet<String>>,
}

impl KeySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the key is already held.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string())
    }

    pub fn release(&self, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquire `key` and return a lease that releases it when dropped.
    #[must_use]
    pub fn lease(self: &Arc<Self>, key: &str) -> Option<KeyLease> {
        if self.try_acquire(key) {
            Some(KeyLease {
                set: Arc::clone(self),
                key: key.to_string(),
            })
        } else {
            debug!(key, "Key already held, rejecting duplicate");
            None
        }
    }
}

#[derive(Debug)]
pub struct KeyLease {
    set: Arc<KeySet>,
    key: String,
}

impl KeyLease {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        self.set.release(&self.key);
    }
}

/// The key spaces shared by all handlers of one desk.
///
/// - `users`: one in-flight open per user
/// - `events`: one handler per inbound event id
/// - `channels`: one in-flight close per ticket channel
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGuard {
    users: Arc<KeySet>,
    events: Arc<KeySet>,
    channels: Arc<KeySet>,
}

impl ConcurrencyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &Arc<KeySet> {
        &self.events
    }

    /// Open is serialized per user within one guild.
    #[must_use]
    pub fn lock_user(&self, guild_id: &str, user_id: &str) -> Option<KeyLease> {
        self.users.lease(&format!("{guild_id}:{user_id}"))
    }

    #[must_use]
    pub fn lock_event(&self, event_id: &str) -> Option<KeyLease> {
        self.events.lease(event_id)
    }

    #[must_use]
    pub fn lock_channel(&self, channel_id: &str) -> Option<KeyLease> {
        self.channels.lease(channel_id)
    }

    #[must_use]
    pub fn is_closing(&self, channel_id: &str) -> bool {
        self.channels.is_held(channel_id)
    }
}
