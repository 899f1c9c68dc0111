use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{comment::CommentView, user::Author};

/// Number of posts per feed page.
pub const PAGE_SIZE: u32 = 10;

/// Upper bound accepted for the `limit` query parameter.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Flat row produced by the feed queries: post columns, joined author columns
/// and viewer-relative aggregates.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub kind: String,
    pub image_url: Option<String>,
    pub published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,

    pub author_id: i64,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub author_slug: String,

    pub likes: i64,
    pub comments_count: i64,
    pub has_liked: bool,
    pub has_bookmarked: bool,
}

impl PostRow {
    pub fn into_view(self, comments: Vec<CommentView>, tags: Vec<Tag>) -> PostView {
        PostView {
            id: self.id,
            title: self.title,
            content: self.content,
            kind: PostKind::parse(&self.kind),
            image_url: self.image_url,
            published: self.published,
            created_at: self.created_at,
            author: Author {
                id: self.author_id,
                name: self.author_name,
                image: self.author_image,
                slug: self.author_slug,
            },
            likes: self.likes,
            comments_count: self.comments_count,
            has_liked: self.has_liked,
            has_bookmarked: self.has_bookmarked,
            comments,
            tags,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Regular,
    Study,
}

impl PostKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "study" => PostKind::Study,
            _ => PostKind::Regular,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Regular => "regular",
            PostKind::Study => "study",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A post as seen by one viewer. `likes` and `comments_count` are caches of
/// the authoritative counts; `has_liked` / `has_bookmarked` belong to the
/// viewer that fetched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub image_url: Option<String>,
    pub published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub author: Author,
    pub likes: i64,
    pub comments_count: i64,
    pub has_liked: bool,
    pub has_bookmarked: bool,
    /// Newest first.
    #[serde(default)]
    pub comments: Vec<CommentView>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One page of the feed. `has_more` comes from the sentinel row the server
/// over-fetches beyond the page size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub has_more: bool,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// 1-based page number (default: 1).
    pub page: Option<u32>,

    /// Number of items per page (default: 10, max: 50).
    pub limit: Option<u32>,
}

impl PostListParams {
    /// Returns `(limit, offset)` with the page clamped to at least 1.
    pub fn window(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (limit, (page - 1).saturating_mul(limit))
    }
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(
        min = 3,
        max = 200,
        message = "Title length must be between 3 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 10,
        max = 20000,
        message = "Content length must be between 10 and 20000 chars"
    ))]
    pub content: String,

    #[serde(rename = "type", default)]
    pub kind: PostKind,

    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,

    pub published: Option<bool>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Authoritative like state of a post for the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkState {
    pub bookmarked: bool,
}
