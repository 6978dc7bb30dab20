//! Publishing new versions of the database while clients keep querying older ones.
//!
//! A hinted database can't be updated in place: hints held by clients would silently stop matching it. Instead every
//! change produces a fresh, immutable snapshot with its own seed, layout and hints. Snapshots are swapped in atomically,
//! so a `respond` call that already picked up a snapshot finishes on it, while new queries addressed to the superseded
//! version are rejected. Clients must then redo the offline phase against the current version.

use crate::{
    HintPIRError,
    config::PirConfig,
    pir_internals::params::SEED_BYTE_LEN,
    server::{OfflineMessages, Server},
};
use arc_swap::ArcSwap;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// An immutable server, together with the offline messages clients need to query it.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    server: Server,
    offline: OfflineMessages,
}

impl Snapshot {
    #[inline(always)]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline(always)]
    pub fn server(&self) -> &Server {
        &self.server
    }

    #[inline(always)]
    pub fn offline_messages(&self) -> &OfflineMessages {
        &self.offline
    }
}

/// Holds the current snapshot of a database, which can be replaced by rebuilding from new content.
pub struct VersionedServer {
    config: PirConfig,
    current: ArcSwap<Snapshot>,
    rebuild_lock: Mutex<()>,
}

impl VersionedServer {
    /// Sets up version 1 of the database.
    pub fn new(config: &PirConfig, db: HashMap<&[u8], &[u8]>) -> Result<VersionedServer, HintPIRError> {
        let snapshot = Self::build_snapshot(config, 1, db)?;

        Ok(VersionedServer {
            config: *config,
            current: ArcSwap::from_pointee(snapshot),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Builds the next version from `db`, with a fresh seed, and publishes it. Concurrent rebuilds are serialized, and
    /// queries keep being answered by the previous version until the new one is published.
    ///
    /// `db` must satisfy the configuration this server was created with. On failure the current version stays in place.
    ///
    /// # Returns
    ///
    /// The version number of the newly published snapshot.
    pub fn rebuild(&self, db: HashMap<&[u8], &[u8]>) -> Result<u64, HintPIRError> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let next_version = self.current.load().version + 1;
        let snapshot = Self::build_snapshot(&self.config, next_version, db)?;
        self.current.store(Arc::new(snapshot));

        tracing::info!(version = next_version, "Published new database version");
        Ok(next_version)
    }

    /// Current snapshot. It stays valid, even if a newer version gets published meanwhile.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn current_version(&self) -> u64 {
        self.current.load().version
    }

    /// Responds to a query which was prepared against database version `version`.
    pub fn respond(&self, version: u64, query: &[u8]) -> Result<Vec<u8>, HintPIRError> {
        let snapshot = self.current.load();

        if snapshot.version != version {
            tracing::warn!(requested = version, current = snapshot.version, "Rejected query for stale database version");
            return Err(HintPIRError::StaleDatabaseVersion {
                requested: version,
                current: snapshot.version,
            });
        }

        snapshot.server.respond(query)
    }

    fn build_snapshot(config: &PirConfig, version: u64, db: HashMap<&[u8], &[u8]>) -> Result<Snapshot, HintPIRError> {
        let mut seed = [0u8; SEED_BYTE_LEN];
        ChaCha20Rng::from_os_rng().fill_bytes(&mut seed);

        let (server, offline) = Server::setup(config, &seed, db)?;
        Ok(Snapshot { version, server, offline })
    }
}
