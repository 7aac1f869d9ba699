//! Cancellation tokens for render tasks
//!
//! A token is shared between whoever started a task and the task itself. The task
//! checks `is_cancelled()` between steps and stops without producing output once the
//! owner has moved on.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

/// Cancellation token for cooperative task cancellation
///
/// Clones share the same state.
///
/// ```
/// use scoremark_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let task_token = token.clone();
///
/// token.cancel();
/// assert!(task_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether both handles are clones of the same token
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokens keyed by surface, document or any other owner
///
/// Registering a key that already holds a token cancels the old one first, so at most
/// one live task exists per key.
#[derive(Debug)]
pub struct CancellationRegistry<K> {
    tokens: Arc<Mutex<HashMap<K, CancellationToken>>>,
}

impl<K: Eq + Hash + Clone> CancellationRegistry<K> {
    pub fn new() -> Self {
        Self { tokens: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a fresh token for `key`, cancelling the one it replaces
    pub fn register(&self, key: K) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock().insert(key, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the token held for `key`; returns whether one was found
    pub fn cancel(&self, key: &K) -> bool {
        match self.lock().remove(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered token and return how many there were
    pub fn cancel_all(&self) -> usize {
        let mut tokens = self.lock();
        let count = tokens.len();
        for (_, token) in tokens.drain() {
            token.cancel();
        }
        count
    }

    /// Forget the token for `key` without cancelling it (the task finished)
    pub fn unregister(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<CancellationToken> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for CancellationRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for CancellationRegistry<K> {
    fn clone(&self) -> Self {
        Self { tokens: Arc::clone(&self.tokens) }
    }
}
