//! Top-level platform client.

use std::sync::Arc;

use crate::blog::BlogStore;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::notify::{LogNotifier, Notifier};
use crate::projects::ProjectStore;
use crate::session::SessionManager;
use crate::storage::{FileStorage, Storage};

/// One shared client instance per process: the gateway plus the stores that
/// own the session, project and blog state.
#[derive(Clone)]
pub struct DataLensClient {
    pub gateway: Gateway,
    pub session: SessionManager,
    pub projects: ProjectStore,
    pub blog: BlogStore,
}

impl DataLensClient {
    /// Build a client with on-disk persistence and tracing notifications.
    pub fn new(config: &ClientConfig) -> Self {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.storage_dir));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        Self::with_parts(config, storage, notifier)
    }

    /// Build a client over explicit storage and notification backends.
    pub fn with_parts(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let gateway = Gateway::new(config, storage.clone(), notifier.clone());
        let session = SessionManager::new(gateway.clone(), storage.clone(), notifier.clone());
        let projects = ProjectStore::new(gateway.clone(), storage, notifier.clone());
        let blog = BlogStore::new(gateway.clone(), notifier);

        Self {
            gateway,
            session,
            projects,
            blog,
        }
    }

    /// Restore the persisted state subset (tokens, user snapshot, project
    /// selection). Call once at startup, before issuing requests.
    pub fn hydrate(&self) -> Result<(), ApiError> {
        self.session.hydrate()?;
        self.projects.hydrate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_hydrate_on_empty_storage() {
        let config = ClientConfig::default();
        let client = DataLensClient::with_parts(
            &config,
            Arc::new(MemoryStorage::new()),
            Arc::new(RecordingNotifier::new()),
        );

        client.hydrate().unwrap();
        assert!(!client.session.is_authenticated());
        assert_eq!(client.projects.current_project(), None);
    }
}
