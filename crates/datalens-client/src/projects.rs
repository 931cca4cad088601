//! Project resource store.
//!
//! Maintains the client-side cache of the project collection, scoped to a
//! view filter (active only vs all). Every mutation round-trips the backend
//! first; the cache transition is a pure reducer over the server's response,
//! so list membership always reflects the last known server state.

use std::mem;
use std::sync::{Arc, RwLock};

use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::models::{Project, ProjectRequest, ProjectStats, SnowflakeStage};
use crate::notify::Notifier;
use crate::storage::{slots, Storage};

/// Predicate deciding which projects belong to the cached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    Active,
    All,
}

impl ViewFilter {
    pub fn admits(&self, project: &Project) -> bool {
        match self {
            ViewFilter::Active => project.is_active,
            ViewFilter::All => true,
        }
    }
}

/// Cache transition applied after a successful mutation.
#[derive(Debug, Clone)]
pub(crate) enum CacheMutation {
    /// A record was created or updated; membership follows the filter.
    Saved(Project),
    /// A record was deleted.
    Removed(String),
}

/// Pure reducer over the cached listing. A saved record is replaced in
/// place, inserted at the head, or removed, according to the filter.
pub(crate) fn apply_mutation(
    mut cache: Vec<Project>,
    filter: ViewFilter,
    mutation: CacheMutation,
) -> Vec<Project> {
    match mutation {
        CacheMutation::Saved(project) => {
            if filter.admits(&project) {
                if let Some(existing) = cache.iter_mut().find(|p| p.id == project.id) {
                    *existing = project;
                } else {
                    cache.insert(0, project);
                }
            } else {
                cache.retain(|p| p.id != project.id);
            }
            cache
        }
        CacheMutation::Removed(id) => {
            cache.retain(|p| p.id != id);
            cache
        }
    }
}

#[derive(Debug, Default)]
struct ProjectState {
    projects: Vec<Project>,
    current: Option<Project>,
    stats: Option<ProjectStats>,
    filter: ViewFilter,
    error: Option<String>,
    loading: bool,
}

/// Client-side store for the project collection.
#[derive(Clone)]
pub struct ProjectStore {
    gateway: Gateway,
    state: Arc<RwLock<ProjectState>>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
}

impl ProjectStore {
    pub fn new(
        gateway: Gateway,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(ProjectState::default())),
            storage,
            notifier,
        }
    }

    // ---- accessors ----

    /// Cached listing for the current view.
    pub fn projects(&self) -> Vec<Project> {
        self.state.read().expect("project lock poisoned").projects.clone()
    }

    /// Currently selected project.
    pub fn current_project(&self) -> Option<Project> {
        self.state.read().expect("project lock poisoned").current.clone()
    }

    /// Last fetched aggregate counts.
    pub fn stats(&self) -> Option<ProjectStats> {
        self.state.read().expect("project lock poisoned").stats.clone()
    }

    /// Transient error of the last failed operation.
    pub fn error(&self) -> Option<String> {
        self.state.read().expect("project lock poisoned").error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().expect("project lock poisoned").loading
    }

    /// View filter the cache is currently scoped to.
    pub fn filter(&self) -> ViewFilter {
        self.state.read().expect("project lock poisoned").filter
    }

    // ---- listings ----

    /// Replace the cache with the active-project listing.
    pub async fn fetch_active(&self) -> Result<Vec<Project>, ApiError> {
        self.begin_fetch(ViewFilter::Active);
        match self.gateway.active_projects().await {
            Ok(projects) => {
                self.finish_fetch(projects.clone());
                Ok(projects)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Replace the cache with the full listing, including archived projects.
    pub async fn fetch_all(&self) -> Result<Vec<Project>, ApiError> {
        self.begin_fetch(ViewFilter::All);
        match self.gateway.all_projects().await {
            Ok(projects) => {
                self.finish_fetch(projects.clone());
                Ok(projects)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Read-only search; does not touch the cache.
    pub async fn search(&self, query: &str) -> Result<Vec<Project>, ApiError> {
        self.gateway.search_projects(query).await
    }

    /// Read-only recent listing; does not touch the scoped cache.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Project>, ApiError> {
        self.gateway.recent_projects(limit).await
    }

    /// Refresh the aggregate counts.
    pub async fn fetch_stats(&self) -> Result<ProjectStats, ApiError> {
        let stats = self.gateway.project_stats().await?;
        self.state.write().expect("project lock poisoned").stats = Some(stats.clone());
        Ok(stats)
    }

    /// Count of the caller's active projects.
    pub async fn active_count(&self) -> Result<u64, ApiError> {
        self.gateway.active_project_count().await
    }

    /// Snowflake stage metadata for a project.
    pub async fn stages(&self, id: &str) -> Result<Vec<SnowflakeStage>, ApiError> {
        self.gateway.project_stages(id).await
    }

    // ---- mutations ----

    /// Create a project. The new record enters the cache only if it matches
    /// the current view's filter.
    pub async fn create(&self, request: &ProjectRequest) -> Result<Project, ApiError> {
        self.begin_mutation();
        match self.gateway.create_project(request).await {
            Ok(project) => {
                {
                    let mut state = self.state.write().expect("project lock poisoned");
                    state.projects = apply_mutation(
                        mem::take(&mut state.projects),
                        state.filter,
                        CacheMutation::Saved(project.clone()),
                    );
                    state.loading = false;
                }
                self.notifier.success("Project created successfully");
                self.spawn_stats_refresh();
                Ok(project)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Update a project. If the returned record falls outside the current
    /// view's filter it leaves the cache (and the selection) atomically with
    /// the mutation's success.
    pub async fn update(&self, id: &str, request: &ProjectRequest) -> Result<Project, ApiError> {
        self.begin_mutation();
        match self.gateway.update_project(id, request).await {
            Ok(updated) => {
                let selection_changed;
                {
                    let mut state = self.state.write().expect("project lock poisoned");
                    state.projects = apply_mutation(
                        mem::take(&mut state.projects),
                        state.filter,
                        CacheMutation::Saved(updated.clone()),
                    );
                    selection_changed =
                        state.current.as_ref().is_some_and(|current| current.id == id);
                    if selection_changed {
                        state.current = state.filter.admits(&updated).then(|| updated.clone());
                    }
                    state.loading = false;
                }
                if selection_changed {
                    self.sync_current();
                }
                self.notifier.success("Project updated successfully");
                self.spawn_stats_refresh();
                Ok(updated)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Delete a project, clearing the selection if it was selected.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.begin_mutation();
        match self.gateway.delete_project(id).await {
            Ok(()) => {
                let selection_changed;
                {
                    let mut state = self.state.write().expect("project lock poisoned");
                    state.projects = apply_mutation(
                        mem::take(&mut state.projects),
                        state.filter,
                        CacheMutation::Removed(id.to_string()),
                    );
                    selection_changed =
                        state.current.as_ref().is_some_and(|current| current.id == id);
                    if selection_changed {
                        state.current = None;
                    }
                    state.loading = false;
                }
                if selection_changed {
                    self.sync_current();
                }
                self.notifier.success("Project deleted successfully");
                self.spawn_stats_refresh();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Archive a project. The cached record's flag is flipped in place
    /// rather than refetched.
    pub async fn archive(&self, id: &str) -> Result<(), ApiError> {
        self.begin_mutation();
        match self.gateway.archive_project(id).await {
            Ok(()) => {
                self.flip_status(id, false);
                self.notifier.success("Project archived successfully");
                self.spawn_stats_refresh();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Restore an archived project.
    pub async fn restore(&self, id: &str) -> Result<(), ApiError> {
        self.begin_mutation();
        match self.gateway.restore_project(id).await {
            Ok(()) => {
                self.flip_status(id, true);
                self.notifier.success("Project restored successfully");
                self.spawn_stats_refresh();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    // ---- selection ----

    /// Pure local selection; persisted and mirrored into the gateway's
    /// project context.
    pub fn set_current_project(&self, project: Option<Project>) {
        self.state.write().expect("project lock poisoned").current = project;
        self.sync_current();
    }

    /// Clear the transient error field.
    pub fn clear_error(&self) {
        self.state.write().expect("project lock poisoned").error = None;
    }

    /// Restore the persisted selection on startup.
    pub fn hydrate(&self) -> Result<(), ApiError> {
        if let Some(raw) = self.storage.read(slots::PROJECT_STATE)? {
            match serde_json::from_str::<Project>(&raw) {
                Ok(project) => {
                    self.gateway.set_project_context(Some(project.id.clone()));
                    self.state.write().expect("project lock poisoned").current = Some(project);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable project selection");
                }
            }
        }
        Ok(())
    }

    // ---- internals ----

    fn begin_fetch(&self, filter: ViewFilter) {
        let mut state = self.state.write().expect("project lock poisoned");
        state.filter = filter;
        state.loading = true;
        state.error = None;
    }

    fn finish_fetch(&self, projects: Vec<Project>) {
        let mut state = self.state.write().expect("project lock poisoned");
        state.projects = projects;
        state.loading = false;
    }

    fn begin_mutation(&self) {
        let mut state = self.state.write().expect("project lock poisoned");
        state.loading = true;
        state.error = None;
    }

    fn fail(&self, err: &ApiError) {
        let mut state = self.state.write().expect("project lock poisoned");
        state.error = Some(err.to_string());
        state.loading = false;
    }

    /// Flip the cached record's `is_active` flag and re-run it through the
    /// reducer so it moves into or out of the view.
    fn flip_status(&self, id: &str, is_active: bool) {
        let selection_changed;
        {
            let mut state = self.state.write().expect("project lock poisoned");
            let record = state
                .projects
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .or_else(|| state.current.clone().filter(|current| current.id == id));

            if let Some(mut project) = record {
                project.is_active = is_active;
                state.projects = apply_mutation(
                    mem::take(&mut state.projects),
                    state.filter,
                    CacheMutation::Saved(project.clone()),
                );
                selection_changed =
                    state.current.as_ref().is_some_and(|current| current.id == id);
                if selection_changed {
                    state.current = state.filter.admits(&project).then_some(project);
                }
            } else {
                selection_changed = false;
            }
            state.loading = false;
        }
        if selection_changed {
            self.sync_current();
        }
    }

    /// Persist the selection and mirror it into the request context.
    fn sync_current(&self) {
        let current = self.current_project();
        self.gateway
            .set_project_context(current.as_ref().map(|p| p.id.clone()));
        match &current {
            Some(project) => match serde_json::to_string(project) {
                Ok(raw) => {
                    if let Err(err) = self.storage.write(slots::PROJECT_STATE, &raw) {
                        tracing::warn!(error = %err, "failed to persist project selection");
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize project selection");
                }
            },
            None => {
                if let Err(err) = self.storage.remove(slots::PROJECT_STATE) {
                    tracing::warn!(error = %err, "failed to clear project selection");
                }
            }
        }
    }

    fn spawn_stats_refresh(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(err) = store.fetch_stats().await {
                tracing::debug!(error = %err, "background stats refresh failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn project(id: &str, is_active: bool) -> Project {
        Project {
            id: id.to_string(),
            name: format!("project {id}"),
            description: None,
            is_active,
            update_date: None,
            update_by: None,
            user_id: None,
            user_email: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn project_body(id: &str, is_active: bool) -> serde_json::Value {
        serde_json::to_value(project(id, is_active)).unwrap()
    }

    fn test_store(server: &MockServer) -> (ProjectStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let config = ClientConfig::default().with_base_url(server.uri());
        let gateway = Gateway::new(&config, storage.clone(), notifier.clone());
        let store = ProjectStore::new(gateway, storage.clone(), notifier);
        (store, storage)
    }

    async fn mount_stats(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/projects/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalProjects": 3,
                "activeProjects": 2,
                "inProgressProjects": 1,
                "completedProjects": 0
            })))
            .mount(server)
            .await;
    }

    // -- reducer --

    #[test]
    fn test_reducer_inserts_admitted_record_at_head() {
        let cache = vec![project("p1", true)];
        let cache = apply_mutation(
            cache,
            ViewFilter::Active,
            CacheMutation::Saved(project("p2", true)),
        );
        let ids: Vec<&str> = cache.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[test]
    fn test_reducer_replaces_in_place() {
        let cache = vec![project("p1", true), project("p2", true)];
        let mut updated = project("p1", true);
        updated.name = "renamed".to_string();

        let cache = apply_mutation(cache, ViewFilter::Active, CacheMutation::Saved(updated));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache[0].name, "renamed");
        assert_eq!(cache[1].id, "p2");
    }

    #[test]
    fn test_reducer_evicts_record_leaving_the_view() {
        let cache = vec![project("p1", true), project("p2", true)];
        let cache = apply_mutation(
            cache,
            ViewFilter::Active,
            CacheMutation::Saved(project("p1", false)),
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].id, "p2");
    }

    #[test]
    fn test_reducer_keeps_inactive_record_under_all() {
        let cache = vec![project("p1", true)];
        let cache = apply_mutation(
            cache,
            ViewFilter::All,
            CacheMutation::Saved(project("p1", false)),
        );
        assert_eq!(cache.len(), 1);
        assert!(!cache[0].is_active);
    }

    #[test]
    fn test_reducer_ignores_inactive_record_under_active() {
        let cache = vec![project("p1", true)];
        let cache = apply_mutation(
            cache,
            ViewFilter::Active,
            CacheMutation::Saved(project("p9", false)),
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].id, "p1");
    }

    #[test]
    fn test_reducer_removes_deleted_record() {
        let cache = vec![project("p1", true), project("p2", true)];
        let cache = apply_mutation(
            cache,
            ViewFilter::Active,
            CacheMutation::Removed("p1".to_string()),
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].id, "p2");
    }

    // -- store --

    #[tokio::test]
    async fn test_create_active_project_appears_once_at_head() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("GET"))
            .and(path("/projects/active"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([project_body("p1", true)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(201).set_body_json(project_body("p2", true)))
            .mount(&server)
            .await;

        store.fetch_active().await.unwrap();
        store
            .create(&ProjectRequest {
                name: "project p2".to_string(),
                description: None,
                is_active: true,
            })
            .await
            .unwrap();

        let ids: Vec<String> = store.projects().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p2".to_string(), "p1".to_string()]);
        assert_eq!(
            ids.iter().filter(|id| id.as_str() == "p2").count(),
            1,
            "created project must appear exactly once"
        );
    }

    #[tokio::test]
    async fn test_create_inactive_project_skips_active_view() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("GET"))
            .and(path("/projects/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(201).set_body_json(project_body("p2", false)))
            .mount(&server)
            .await;

        store.fetch_active().await.unwrap();
        store
            .create(&ProjectRequest {
                name: "project p2".to_string(),
                description: None,
                is_active: false,
            })
            .await
            .unwrap();

        assert!(store.projects().is_empty());
    }

    #[tokio::test]
    async fn test_update_flipping_inactive_leaves_active_view() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("GET"))
            .and(path("/projects/active"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([project_body("p1", true)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/projects/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_body("p1", false)))
            .mount(&server)
            .await;

        store.fetch_active().await.unwrap();
        store.set_current_project(Some(project("p1", true)));

        store
            .update(
                "p1",
                &ProjectRequest {
                    name: "project p1".to_string(),
                    description: None,
                    is_active: false,
                },
            )
            .await
            .unwrap();

        assert!(store.projects().iter().all(|p| p.id != "p1"));
        assert_eq!(store.current_project(), None);
    }

    #[tokio::test]
    async fn test_delete_clears_selection() {
        let server = MockServer::start().await;
        let (store, storage) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/projects/p1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        store.set_current_project(Some(project("p1", true)));
        assert!(storage.read(slots::PROJECT_STATE).unwrap().is_some());

        store.delete("p1").await.unwrap();
        assert_eq!(store.current_project(), None);
        assert_eq!(storage.read(slots::PROJECT_STATE).unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_cache_untouched() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);

        Mock::given(method("GET"))
            .and(path("/projects/active"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([project_body("p1", true)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/projects/p1"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "Update failed" })),
            )
            .mount(&server)
            .await;

        store.fetch_active().await.unwrap();
        let before = store.projects();

        let err = store
            .update(
                "p1",
                &ProjectRequest {
                    name: "renamed".to_string(),
                    description: None,
                    is_active: true,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(store.projects(), before);
        assert_eq!(store.error().as_deref(), Some("Update failed"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_archive_flips_record_out_of_active_view() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("GET"))
            .and(path("/projects/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                project_body("p1", true),
                project_body("p2", true)
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/projects/p1/archive"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        store.fetch_active().await.unwrap();
        store.archive("p1").await.unwrap();

        let ids: Vec<String> = store.projects().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_flips_record_in_place_under_all() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);
        mount_stats(&server).await;

        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([project_body("p1", false)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/projects/p1/restore"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        store.fetch_all().await.unwrap();
        store.restore("p1").await.unwrap();

        let projects = store.projects();
        assert_eq!(projects.len(), 1);
        assert!(projects[0].is_active);
    }

    #[tokio::test]
    async fn test_search_does_not_mutate_cache() {
        let server = MockServer::start().await;
        let (store, _) = test_store(&server);

        Mock::given(method("GET"))
            .and(path("/projects/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([project_body("p9", true)])),
            )
            .mount(&server)
            .await;

        let results = store.search("nine").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(store.projects().is_empty());
    }

    #[tokio::test]
    async fn test_selection_survives_hydration() {
        let server = MockServer::start().await;
        let (store, storage) = test_store(&server);

        store.set_current_project(Some(project("p1", true)));

        // A fresh store over the same storage sees the persisted selection.
        let notifier = Arc::new(RecordingNotifier::new());
        let config = ClientConfig::default().with_base_url(server.uri());
        let gateway = Gateway::new(&config, storage.clone(), notifier.clone());
        let restored = ProjectStore::new(gateway, storage, notifier);
        restored.hydrate().unwrap();

        assert_eq!(restored.current_project().unwrap().id, "p1");
    }
}
