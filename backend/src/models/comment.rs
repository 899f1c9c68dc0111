use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::user::Author;

/// Flat comment row joined with its author and viewer-relative like state.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub author_slug: String,
    pub likes: i64,
    pub has_liked: bool,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        CommentView {
            id: row.id,
            post_id: row.post_id,
            content: row.content,
            created_at: row.created_at,
            author: Author {
                id: row.author_id,
                name: row.author_name,
                image: row.author_image,
                slug: row.author_slug,
            },
            likes: row.likes,
            has_liked: row.has_liked,
        }
    }
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub author: Author,
    pub likes: i64,
    pub has_liked: bool,
}

/// DTO for creating or editing a comment.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommentContent {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// Authoritative like state of a comment for the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLikeState {
    pub likes_count: i64,
    pub has_liked: bool,
}
