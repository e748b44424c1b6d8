use std::sync::Arc;

use tokio::sync::Semaphore;
use tryon_db::SessionStore;

use crate::config::ServerConfig;
use crate::storage::StorageService;
use crate::transform::Transform;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). The store and
/// the transform are trait objects: the selected persistence backend and
/// the transform strategy are both decided once at startup and nothing
/// downstream knows the concrete type.
#[derive(Clone)]
pub struct AppState {
    /// The persistence backend selected at process start.
    pub store: Arc<dyn SessionStore>,
    /// Asset storage under the upload directory.
    pub storage: Arc<StorageService>,
    /// The pluggable try-on transform.
    pub transform: Arc<dyn Transform>,
    /// Server configuration resolved at startup.
    pub config: Arc<ServerConfig>,
    /// Bounds the number of sessions processing at once. Dispatch is still
    /// fire-and-forget; a spawned task waits here before touching the row.
    pub worker_permits: Arc<Semaphore>,
}
