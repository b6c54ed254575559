//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use docchat_core::ports::{ArtifactStore, CompletionService, StoreService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreService>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub completion: Arc<dyn CompletionService>,
    pub config: Arc<Config>,
}
