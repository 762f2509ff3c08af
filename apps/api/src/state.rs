use std::sync::Arc;

use crate::apply::repository::ApplicationStore;
use crate::notify::NotificationDispatcher;

/// Shared application state injected into all route handlers via Axum extractors.
/// Collaborators are built once in `main` and shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ApplicationStore>,
    pub notifier: NotificationDispatcher,
}
