//! Shared application state: the store slot, the room directory, and the
//! broadcast hub.

pub mod hub;
pub mod registry;
pub mod room;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::room_store::RoomStore, error::ServiceError};

pub use self::hub::{BroadcastHub, ConnectionId};
pub use self::registry::{RoomDirectory, RoomHandle};

pub type SharedState = Arc<AppState>;

/// Central application state shared by every connection task.
///
/// The store slot is swappable: the storage supervisor installs a backend
/// once it connects and clears it when the connection is lost, flipping the
/// degraded flag either way.
pub struct AppState {
    config: Arc<AppConfig>,
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    directory: RoomDirectory,
    hub: BroadcastHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            room_store: RwLock::new(None),
            directory: RoomDirectory::new(),
            hub: BroadcastHub::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Directory of active rooms.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Fan-out router for server events.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current room store or fail with the degraded-mode error.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
