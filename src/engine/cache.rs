//! Mined tickets per manifest, computed once and kept forever.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::error::{EngineError, SourceError};
use crate::models::{Manifest, ManifestPair, ManifestTickets};
use crate::sources::TicketMiner;

/// Append-only store of mined tickets.
///
/// A record is written at most once per manifest and never updated. Storing a
/// record that already exists is a no-op, not an error.
pub trait TicketCache: Send + Sync {
    fn cached(&self, manifest_names: &[String]) -> Result<Vec<ManifestTickets>>;

    fn store(&self, tickets: &ManifestTickets) -> Result<()>;
}

/// Answers "which tickets belong to these manifests" from the cache, mining
/// only what is missing.
///
/// Fully cached requests never wait. Otherwise re-check, mine and store run
/// under one async lock, so a manifest is mined at most once per process even
/// when requests overlap.
#[derive(Clone)]
pub struct CachedMiner {
    cache: Arc<dyn TicketCache>,
    miner: Arc<dyn TicketMiner>,
    lock: Arc<Mutex<()>>,
    timeout: Duration,
}

impl CachedMiner {
    pub fn new(cache: Arc<dyn TicketCache>, miner: Arc<dyn TicketMiner>, timeout: Duration) -> Self {
        Self {
            cache,
            miner,
            lock: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    /// Tickets for `manifests` (oldest first). The first manifest has no
    /// predecessor and is never mined.
    pub async fn tickets_for(&self, manifests: &[Manifest]) -> Result<Vec<ManifestTickets>, EngineError> {
        if manifests.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = manifests.iter().map(|m| m.name.clone()).collect();

        let tickets = self.cache.cached(&names).map_err(EngineError::Cache)?;
        if missing_pairs(manifests, &tickets).is_empty() {
            tracing::trace!(manifests = manifests.len(), "All manifest tickets served from cache");
            return Ok(tickets);
        }

        let _guard = self.lock.lock().await;

        // Another request may have mined while we waited.
        let mut tickets = self.cache.cached(&names).map_err(EngineError::Cache)?;
        let pairs = missing_pairs(manifests, &tickets);
        if pairs.is_empty() {
            return Ok(tickets);
        }

        tracing::info!(pairs = pairs.len(), "Mining tickets for uncached manifests");
        let mined = tokio::time::timeout(self.timeout, self.miner.mine(pairs))
            .await
            .map_err(|_| SourceError::Timeout("ticket mining".to_string()))??;

        for entry in &mined {
            self.cache.store(entry).map_err(EngineError::Cache)?;
        }

        tickets.extend(mined);
        Ok(tickets)
    }
}

/// Consecutive pairs whose current manifest has no cached record.
fn missing_pairs(manifests: &[Manifest], cached: &[ManifestTickets]) -> Vec<ManifestPair> {
    let known: HashSet<&str> = cached.iter().map(|t| t.manifest_name.as_str()).collect();
    manifests
        .windows(2)
        .filter(|pair| !known.contains(pair[1].name.as_str()))
        .map(|pair| ManifestPair {
            previous: pair[0].clone(),
            current: pair[1].clone(),
        })
        .collect()
}
