//! Sharded session registry
//!
//! Open sessions are looked up on every producer write, so the registry
//! is split into a fixed number of shards to keep unrelated sessions
//! from contending on one lock. A handle always maps to the same shard.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PipelineError, Result};
use crate::session::{Session, SessionHandle};

/// Number of registry shards
const SHARD_COUNT: usize = 16;

/// Sharded map from handle to open session
pub struct SessionRegistry {
    shards: Vec<RwLock<HashMap<u64, Arc<Session>>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    #[inline]
    fn shard(&self, handle: SessionHandle) -> &RwLock<HashMap<u64, Arc<Session>>> {
        // Fibonacci hashing spreads sequential handles across shards
        let index = (handle.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 60) as usize;
        &self.shards[index % SHARD_COUNT]
    }

    /// Register an open session
    ///
    /// Fails if a session with the same handle is already registered.
    pub fn insert(&self, session: Arc<Session>) -> Result<()> {
        let handle = session.handle();
        let mut shard = self.shard(handle).write();
        if shard.contains_key(&handle.raw()) {
            return Err(PipelineError::DuplicateHandle(handle));
        }
        shard.insert(handle.raw(), session);
        Ok(())
    }

    /// Look up an open session
    pub fn get(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        self.shard(handle).read().get(&handle.raw()).cloned()
    }

    /// Remove and return a session
    pub fn remove(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        self.shard(handle).write().remove(&handle.raw())
    }

    /// Remove and return every registered session
    pub fn drain_all(&self) -> Vec<Arc<Session>> {
        let mut sessions = Vec::new();
        for shard in &self.shards {
            sessions.extend(shard.write().drain().map(|(_, s)| s));
        }
        sessions.sort_by_key(|s| s.handle());
        sessions
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// True if no sessions are open
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Visit every open session
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Session>)) {
        for shard in &self.shards {
            for session in shard.read().values() {
                f(session);
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
