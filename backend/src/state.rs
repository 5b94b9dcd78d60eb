//! Shared application state.
//!
//! Built once in `main.rs` and handed to every worker as `web::Data<AppState>`.
//! Cloning is cheap: both fields are reference counted.

use crate::config::AppConfig;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        AppState {
            config: Arc::new(config),
            store,
        }
    }
}
