use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::notify::LogNotifier;
use crate::store::memory::MemoryStore;
use crate::store::Store;

pub mod api;
pub mod authz;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logger;
pub mod notify;
pub mod store;

/// Builds an engine over the in-memory store with the system clock and
/// the logging notifier. Callers wanting different seams use
/// [`Engine::new`] directly.
pub fn default_engine(config: EngineConfig) -> Engine {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    Engine::new(store, Arc::new(SystemClock), Arc::new(LogNotifier), config)
}
