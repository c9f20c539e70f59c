//! Application state shared across handlers.

use session_manager::SessionManager;
use session_server::SessionServerHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Session manager of this node
    pub manager: SessionManager,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Session server owned by this node.
    pub fn local_server(&self) -> &SessionServerHandle {
        self.manager.local_server()
    }

    pub fn local_address(&self) -> &str {
        self.manager.local_address()
    }
}
