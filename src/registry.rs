//! Per-tenant engine registry.
//!
//! An API layer serves many (user, project) tenants; constructing an
//! engine per request would reopen the database and rebuild the embedding
//! client every time. The registry hands out shared engines with
//! create-or-get semantics and evicts entries idle past a TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::ProjectEngine;
use crate::error::Result;
use crate::types::Tenant;

/// Builds an engine for a tenant on first use.
pub type EngineFactory = Box<dyn Fn(&Tenant) -> Result<ProjectEngine> + Send + Sync>;

struct Entry {
    engine: Arc<Mutex<ProjectEngine>>,
    last_used: Instant,
}

/// Create-or-get registry of per-tenant engines with idle expiry.
pub struct EngineRegistry {
    entries: Mutex<HashMap<Tenant, Entry>>,
    factory: EngineFactory,
    ttl: Duration,
}

impl EngineRegistry {
    pub fn new(factory: EngineFactory, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            factory,
            ttl,
        }
    }

    /// The engine for `tenant`, creating it on first use. Refreshes the
    /// entry's idle clock.
    pub fn get_or_create(&self, tenant: &Tenant) -> Result<Arc<Mutex<ProjectEngine>>> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");

        if let Some(entry) = entries.get_mut(tenant) {
            entry.last_used = Instant::now();
            return Ok(Arc::clone(&entry.engine));
        }

        let engine = (self.factory)(tenant)?;
        let engine = Arc::new(Mutex::new(engine));
        entries.insert(
            tenant.clone(),
            Entry {
                engine: Arc::clone(&engine),
                last_used: Instant::now(),
            },
        );
        debug!(tenant = %tenant, "engine created");
        Ok(engine)
    }

    /// Drop entries idle longer than the TTL; returns how many were
    /// evicted. Callers holding an `Arc` keep their engine alive past
    /// eviction.
    pub fn evict_idle(&self) -> usize {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.last_used.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
