//! Blog content store.
//!
//! Caches the most recently fetched post listing and keeps it consistent
//! with author and moderator mutations. Fetches replace the listing;
//! mutations update it in place by id.

use std::sync::{Arc, RwLock};

use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::models::{BlogPost, BlogPostRequest, Page};
use crate::notify::Notifier;

#[derive(Debug, Default)]
struct BlogState {
    posts: Vec<BlogPost>,
    error: Option<String>,
    loading: bool,
}

/// Client-side store for blog posts and their moderation lifecycle.
#[derive(Clone)]
pub struct BlogStore {
    gateway: Gateway,
    state: Arc<RwLock<BlogState>>,
    notifier: Arc<dyn Notifier>,
}

impl BlogStore {
    pub fn new(gateway: Gateway, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(BlogState::default())),
            notifier,
        }
    }

    /// Cached listing from the last fetch.
    pub fn posts(&self) -> Vec<BlogPost> {
        self.state.read().expect("blog lock poisoned").posts.clone()
    }

    /// Transient error of the last failed operation.
    pub fn error(&self) -> Option<String> {
        self.state.read().expect("blog lock poisoned").error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().expect("blog lock poisoned").loading
    }

    // ---- listings ----

    /// Published posts, public listing.
    pub async fn fetch_published(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        self.fetch_with(|gateway| async move { gateway.published_posts(page, size).await })
            .await
    }

    /// The caller's own posts, any status.
    pub async fn fetch_mine(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        self.fetch_with(|gateway| async move { gateway.my_posts(page, size).await })
            .await
    }

    /// Posts awaiting moderation (admin only).
    pub async fn fetch_pending(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        self.fetch_with(|gateway| async move { gateway.pending_posts(page, size).await })
            .await
    }

    async fn fetch_with<F, Fut>(&self, call: F) -> Result<Page<BlogPost>, ApiError>
    where
        F: FnOnce(Gateway) -> Fut,
        Fut: std::future::Future<Output = Result<Page<BlogPost>, ApiError>>,
    {
        {
            let mut state = self.state.write().expect("blog lock poisoned");
            state.loading = true;
            state.error = None;
        }
        match call(self.gateway.clone()).await {
            Ok(listing) => {
                let mut state = self.state.write().expect("blog lock poisoned");
                state.posts = listing.content.clone();
                state.loading = false;
                drop(state);
                Ok(listing)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    // ---- author mutations ----

    pub async fn create(&self, request: &BlogPostRequest) -> Result<BlogPost, ApiError> {
        self.begin();
        match self.gateway.create_post(request).await {
            Ok(post) => {
                self.insert(post.clone());
                self.notifier.success("Post created successfully");
                Ok(post)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    pub async fn update(&self, id: &str, request: &BlogPostRequest) -> Result<BlogPost, ApiError> {
        self.begin();
        match self.gateway.update_post(id, request).await {
            Ok(post) => {
                self.replace(post.clone());
                self.notifier.success("Post updated successfully");
                Ok(post)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.begin();
        match self.gateway.delete_post(id).await {
            Ok(()) => {
                let mut state = self.state.write().expect("blog lock poisoned");
                state.posts.retain(|post| post.id != id);
                state.loading = false;
                drop(state);
                self.notifier.success("Post deleted successfully");
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Submit a draft for moderation.
    pub async fn submit(&self, id: &str) -> Result<BlogPost, ApiError> {
        self.begin();
        match self.gateway.submit_post(id).await {
            Ok(post) => {
                self.replace(post.clone());
                self.notifier.success("Post submitted for approval");
                Ok(post)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    // ---- moderator mutations ----

    pub async fn approve(&self, id: &str) -> Result<BlogPost, ApiError> {
        self.begin();
        match self.gateway.approve_post(id).await {
            Ok(post) => {
                self.replace(post.clone());
                self.notifier.success("Post approved");
                Ok(post)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    pub async fn reject(&self, id: &str, reason: Option<&str>) -> Result<BlogPost, ApiError> {
        self.begin();
        match self.gateway.reject_post(id, reason).await {
            Ok(post) => {
                self.replace(post.clone());
                self.notifier.success("Post rejected");
                Ok(post)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    // ---- internals ----

    fn begin(&self) {
        let mut state = self.state.write().expect("blog lock poisoned");
        state.loading = true;
        state.error = None;
    }

    fn fail(&self, err: &ApiError) {
        let mut state = self.state.write().expect("blog lock poisoned");
        state.error = Some(err.to_string());
        state.loading = false;
    }

    fn insert(&self, post: BlogPost) {
        let mut state = self.state.write().expect("blog lock poisoned");
        state.posts.insert(0, post);
        state.loading = false;
    }

    fn replace(&self, post: BlogPost) {
        let mut state = self.state.write().expect("blog lock poisoned");
        if let Some(existing) = state.posts.iter_mut().find(|p| p.id == post.id) {
            *existing = post;
        } else {
            state.posts.insert(0, post);
        }
        state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::models::BlogPostStatus;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post_body(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("post {id}"),
            "slug": format!("post-{id}"),
            "status": status,
            "tags": ["analytics"]
        })
    }

    fn page_body(posts: Vec<serde_json::Value>) -> serde_json::Value {
        let total = posts.len();
        json!({
            "content": posts,
            "totalElements": total,
            "totalPages": 1,
            "number": 0,
            "size": 10
        })
    }

    fn test_store(server: &MockServer) -> BlogStore {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let config = ClientConfig::default().with_base_url(server.uri());
        let gateway = Gateway::new(&config, storage, notifier.clone());
        BlogStore::new(gateway, notifier)
    }

    #[tokio::test]
    async fn test_fetch_replaces_listing() {
        let server = MockServer::start().await;
        let store = test_store(&server);

        Mock::given(method("GET"))
            .and(path("/blog/posts"))
            .and(query_param("page", "0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(vec![post_body("b1", "PUBLISHED")])),
            )
            .mount(&server)
            .await;

        let listing = store.fetch_published(0, 10).await.unwrap();
        assert_eq!(listing.total_elements, 1);
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.posts()[0].status, BlogPostStatus::Published);
    }

    #[tokio::test]
    async fn test_approve_updates_listing_in_place() {
        let server = MockServer::start().await;
        let store = test_store(&server);

        Mock::given(method("GET"))
            .and(path("/blog/admin/pending-posts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(vec![post_body("b1", "PENDING_APPROVAL")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/blog/admin/posts/b1/approve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_body("b1", "PUBLISHED")))
            .mount(&server)
            .await;

        store.fetch_pending(0, 10).await.unwrap();
        assert_eq!(store.posts()[0].status, BlogPostStatus::PendingApproval);

        store.approve("b1").await.unwrap();
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.posts()[0].status, BlogPostStatus::Published);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_listing() {
        let server = MockServer::start().await;
        let store = test_store(&server);

        Mock::given(method("GET"))
            .and(path("/blog/my-posts"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_body(vec![post_body("b1", "DRAFT")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/blog/posts/b1"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({ "error": "You are not the author" })),
            )
            .mount(&server)
            .await;

        store.fetch_mine(0, 10).await.unwrap();
        let err = store.delete("b1").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.error().as_deref(), Some("You are not the author"));
    }
}
