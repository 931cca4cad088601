//! Wire models for the platform REST API.
//!
//! Field casing follows the backend exactly: user, blog and statistics
//! payloads are camelCase, project payloads are snake_case, and
//! `ProjectRequest` is camelCase (`isActive`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user profile, as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Whether the user carries the given role (e.g. `"ADMIN"`).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Access/refresh token pair. The refresh token is rotated by the backend
/// on every refresh, so a pair is only valid for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response of `POST /auth/login` and `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

impl AuthResponse {
    /// The token pair carried by this response.
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Project record. List membership in the "active projects" view is
/// controlled by `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_by: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for project create and update calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

/// Aggregate project counts for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_projects: u64,
    pub active_projects: u64,
    #[serde(default)]
    pub in_progress_projects: u64,
    #[serde(default)]
    pub completed_projects: u64,
}

/// Snowflake stage metadata, scoped to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeStage {
    pub stage_name: String,
    pub stage_schema: String,
    pub stage_database: String,
    pub stage_type: String,
    pub stage_location: String,
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub copy_options: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub owner: String,
    pub created: String,
}

/// Moderation lifecycle of a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlogPostStatus {
    Draft,
    PendingApproval,
    Published,
    Rejected,
}

/// Blog post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    pub status: BlogPostStatus,
    #[serde(default)]
    pub featured_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for blog post create and update calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostRequest {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image_url: Option<String>,
}

/// One page of a paged listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_deserialization() {
        let json = json!({
            "id": "u1",
            "email": "a@b.com",
            "isVerified": true,
            "roles": ["USER", "ADMIN"]
        });

        let user: User = serde_json::from_value(json).unwrap();
        assert_eq!(user.email, "a@b.com");
        assert!(user.is_verified);
        assert!(user.has_role("ADMIN"));
        assert!(!user.has_role("MODERATOR"));
    }

    #[test]
    fn test_project_deserialization() {
        let json = json!({
            "id": "p1",
            "name": "Churn model",
            "description": "Quarterly churn analysis",
            "is_active": true,
            "user_email": "a@b.com",
            "created_at": "2025-11-03T09:30:00Z"
        });

        let project: Project = serde_json::from_value(json).unwrap();
        assert_eq!(project.id, "p1");
        assert!(project.is_active);
        assert_eq!(project.user_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_project_request_serializes_camel_case() {
        let request = ProjectRequest {
            name: "Churn model".to_string(),
            description: None,
            is_active: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["isActive"], json!(false));
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_blog_post_status_wire_format() {
        let status: BlogPostStatus = serde_json::from_value(json!("PENDING_APPROVAL")).unwrap();
        assert_eq!(status, BlogPostStatus::PendingApproval);
        assert_eq!(
            serde_json::to_value(BlogPostStatus::Published).unwrap(),
            json!("PUBLISHED")
        );
    }

    #[test]
    fn test_refresh_response_ignores_extra_fields() {
        let json = json!({
            "access_token": "T2",
            "refresh_token": "R2",
            "expires_in": 900,
            "token_type": "Bearer"
        });

        let pair: TokenPair = serde_json::from_value(json).unwrap();
        assert_eq!(pair.access_token, "T2");
        assert_eq!(pair.refresh_token, "R2");
    }
}
