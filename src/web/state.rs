//! Shared application state.

use std::sync::Arc;

use crate::enrollment::EnrollmentDirectory;
use crate::friendship::FriendshipService;
use crate::messaging::MessagingService;
use crate::realtime::ConnectionRegistry;
use crate::store::GraphStore;
use crate::suggestions::SuggestionEngine;

pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub friendship: FriendshipService,
    pub suggestions: SuggestionEngine,
    pub messaging: MessagingService,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        let enrollment = EnrollmentDirectory::new(Arc::clone(&store));
        Self {
            friendship: FriendshipService::new(Arc::clone(&store)),
            suggestions: SuggestionEngine::new(Arc::clone(&store), enrollment),
            messaging: MessagingService::new(Arc::clone(&store)),
            registry: Arc::new(ConnectionRegistry::new()),
            store,
        }
    }
}

pub type SharedState = Arc<AppState>;
