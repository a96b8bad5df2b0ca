//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{AuthApi, DataApi, RestBackend};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// managed backend and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    data: Arc<dyn DataApi>,
    auth: Arc<dyn AuthApi>,
}

impl AppState {
    /// Create application state talking to the configured backend over HTTP.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let backend = Arc::new(RestBackend::new(&config.backend));
        Self::with_backend(config, backend.clone(), backend)
    }

    /// Create application state over explicit backend implementations.
    #[must_use]
    pub fn with_backend(
        config: StorefrontConfig,
        data: Arc<dyn DataApi>,
        auth: Arc<dyn AuthApi>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, data, auth }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The backend data API.
    #[must_use]
    pub fn data(&self) -> &dyn DataApi {
        self.inner.data.as_ref()
    }

    /// The backend auth API.
    #[must_use]
    pub fn auth(&self) -> &dyn AuthApi {
        self.inner.auth.as_ref()
    }
}
