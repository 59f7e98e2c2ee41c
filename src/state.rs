//! Shared application state for the service routes.

use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    /// Base store connection; requests borrow sessions from it, never use it directly.
    pub store: SharedStore,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        AppState { store }
    }
}
