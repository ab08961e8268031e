pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.svg";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/default-header.svg";

/// Account row as stored in the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
}

/// A single warble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: i64,
}

/// Message joined with author columns, as rendered in feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: i64,
    pub username: String,
    pub image_url: String,
}

/// Profile counters shown on user pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserStats {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}
