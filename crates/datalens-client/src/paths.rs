//! Endpoint paths of the consumed REST surface, relative to the API base URL.

pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_REGISTER: &str = "/auth/register";
pub const AUTH_REFRESH: &str = "/auth/refresh";
pub const AUTH_VERIFY_EMAIL: &str = "/auth/verify-email";
pub const AUTH_REQUEST_PASSWORD_RESET: &str = "/auth/request-password-reset";
pub const AUTH_RESET_PASSWORD: &str = "/auth/reset-password";

pub const USERS_ME: &str = "/users/me";

pub const PROJECTS: &str = "/projects";
pub const PROJECTS_ACTIVE: &str = "/projects/active";
pub const PROJECTS_SEARCH: &str = "/projects/search";
pub const PROJECTS_COUNT: &str = "/projects/count";
pub const PROJECTS_STATS: &str = "/projects/stats";
pub const PROJECTS_RECENT: &str = "/projects/recent";

pub const BLOG_POSTS: &str = "/blog/posts";
pub const BLOG_MY_POSTS: &str = "/blog/my-posts";
pub const BLOG_PENDING_POSTS: &str = "/blog/admin/pending-posts";

pub fn project(id: &str) -> String {
    format!("{PROJECTS}/{id}")
}

pub fn project_archive(id: &str) -> String {
    format!("{PROJECTS}/{id}/archive")
}

pub fn project_restore(id: &str) -> String {
    format!("{PROJECTS}/{id}/restore")
}

pub fn project_stages(id: &str) -> String {
    format!("{PROJECTS}/{id}/stages")
}

pub fn blog_post(id: &str) -> String {
    format!("{BLOG_POSTS}/{id}")
}

pub fn blog_post_submit(id: &str) -> String {
    format!("{BLOG_POSTS}/{id}/submit")
}

pub fn blog_post_approve(id: &str) -> String {
    format!("/blog/admin/posts/{id}/approve")
}

pub fn blog_post_reject(id: &str) -> String {
    format!("/blog/admin/posts/{id}/reject")
}
