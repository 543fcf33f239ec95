//! Roster persistence.
//!
//! Every backend stores the whole [`RosterSnapshot`] as one JSON document and
//! runs it through [`migrations`] on load, so documents written by older
//! releases are read transparently.

pub mod file;
pub mod hosted;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::roster::RosterSnapshot;

pub use file::FileStore;
pub use hosted::HostedStore;
pub use sqlite::SqliteStore;

/// Somewhere the roster document lives.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Short backend name, as used in logs and errors.
    fn name(&self) -> &'static str;

    /// Where the document lives, for display.
    fn location(&self) -> String;

    /// Read the current roster, migrating older shapes.
    ///
    /// A store that has never been written yields an empty roster.
    async fn load(&self) -> Result<RosterSnapshot>;

    /// Replace the stored roster with `snapshot`.
    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()>;
}

#[async_trait]
impl RosterStore for Box<dyn RosterStore> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn location(&self) -> String {
        (**self).location()
    }

    async fn load(&self) -> Result<RosterSnapshot> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
        (**self).save(snapshot).await
    }
}

/// A primary store backed by a secondary one.
///
/// The first time the primary reports itself unavailable, the fallback
/// takes over for the rest of the process. Switching back mid-process
/// would let a save overwrite the primary with data it never held.
pub struct FallbackStore {
    primary: Box<dyn RosterStore>,
    fallback: Box<dyn RosterStore>,
    degraded: AtomicBool,
}

impl std::fmt::Debug for FallbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStore")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl FallbackStore {
    /// Wrap `primary` so unavailability diverts to `fallback`.
    #[must_use]
    pub fn new(primary: Box<dyn RosterStore>, fallback: Box<dyn RosterStore>) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the fallback has taken over.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self, reason: &crate::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                primary = self.primary.name(),
                fallback = %self.fallback.location(),
                "{reason}; continuing with the fallback store"
            );
        }
    }
}

#[async_trait]
impl RosterStore for FallbackStore {
    fn name(&self) -> &'static str {
        if self.is_degraded() {
            self.fallback.name()
        } else {
            self.primary.name()
        }
    }

    fn location(&self) -> String {
        if self.is_degraded() {
            self.fallback.location()
        } else {
            format!(
                "{} (fallback: {})",
                self.primary.location(),
                self.fallback.location()
            )
        }
    }

    async fn load(&self) -> Result<RosterSnapshot> {
        if !self.is_degraded() {
            match self.primary.load().await {
                Err(e) if e.is_store_unavailable() => self.degrade(&e),
                other => return other,
            }
        }
        self.fallback.load().await
    }

    async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
        if !self.is_degraded() {
            match self.primary.save(snapshot).await {
                Err(e) if e.is_store_unavailable() => self.degrade(&e),
                other => return other,
            }
        }
        self.fallback.save(snapshot).await
    }
}

/// Build the store selected by `config`.
///
/// With `hosted.enabled` the hosted store is primary and the JSON file is
/// the fallback. Otherwise `storage.backend` picks the local backend.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the HTTP client
/// cannot be built.
pub fn open_store(config: &Config) -> Result<Box<dyn RosterStore>> {
    let store: Box<dyn RosterStore> = if config.hosted.enabled {
        let hosted = HostedStore::from_config(config)?;
        let file = FileStore::new(config.data_file());
        Box::new(FallbackStore::new(Box::new(hosted), Box::new(file)))
    } else {
        match config.storage.backend {
            StorageBackend::File => Box::new(FileStore::new(config.data_file())),
            StorageBackend::Sqlite => Box::new(SqliteStore::open(config.database_path())?),
        }
    };

    info!(backend = store.name(), location = %store.location(), "Roster store ready");
    Ok(store)
}

#[cfg(test)]
pub(crate) mod testing {
    //! An in-memory store for service and fallback tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::{async_trait, Result, RosterSnapshot, RosterStore};
    use crate::Error;

    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub snapshot: Mutex<RosterSnapshot>,
        pub unavailable: bool,
        pub saves: AtomicUsize,
    }

    impl MemoryStore {
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }

        pub fn seeded(snapshot: RosterSnapshot) -> Self {
            Self {
                snapshot: Mutex::new(snapshot),
                ..Self::default()
            }
        }

        pub fn current(&self) -> RosterSnapshot {
            self.snapshot.lock().unwrap().clone()
        }

        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RosterStore for MemoryStore {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn location(&self) -> String {
            "memory".to_string()
        }

        async fn load(&self) -> Result<RosterSnapshot> {
            if self.unavailable {
                return Err(Error::store_unavailable("memory", "offline"));
            }
            Ok(self.current())
        }

        async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
            if self.unavailable {
                return Err(Error::store_unavailable("memory", "offline"));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.snapshot.lock().unwrap() = snapshot.clone();
            Ok(())
        }
    }

    #[async_trait]
    impl<T: RosterStore> RosterStore for std::sync::Arc<T> {
        fn name(&self) -> &'static str {
            (**self).name()
        }

        fn location(&self) -> String {
            (**self).location()
        }

        async fn load(&self) -> Result<RosterSnapshot> {
            (**self).load().await
        }

        async fn save(&self, snapshot: &RosterSnapshot) -> Result<()> {
            (**self).save(snapshot).await
        }
    }
}
