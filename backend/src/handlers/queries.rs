// src/handlers/queries.rs

use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{
        comment::{CommentRow, CommentView},
        post::{PostRow, PostView, Tag},
    },
};

/// Post columns plus author and viewer-relative aggregates.
/// Binds: viewer id, viewer id.
pub const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.content, p.kind, p.image_url, p.published, p.created_at,
        u.id AS author_id, u.name AS author_name, u.image AS author_image, u.slug AS author_slug,
        (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS likes,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
        EXISTS(SELECT 1 FROM post_likes pl WHERE pl.post_id = p.id AND pl.user_id = ?) AS has_liked,
        EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ?) AS has_bookmarked
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Comment columns plus author and viewer-relative like state.
/// Binds: viewer id.
pub const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.content, c.created_at,
        u.id AS author_id, u.name AS author_name, u.image AS author_image, u.slug AS author_slug,
        (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS likes,
        EXISTS(SELECT 1 FROM comment_likes cl WHERE cl.comment_id = c.id AND cl.user_id = ?) AS has_liked
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[derive(FromRow)]
struct PostTagRow {
    post_id: i64,
    id: i64,
    name: String,
}

/// Attaches comments (newest first) and tags to a batch of post rows,
/// preserving the row order.
pub async fn assemble_posts(
    pool: &SqlitePool,
    viewer: i64,
    rows: Vec<PostRow>,
) -> Result<Vec<PostView>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    // COMMENT_SELECT carries its own viewer placeholder, so the IN list is
    // spelled out and bound after it.
    let comments_sql = format!(
        "{} WHERE c.post_id IN ({}) ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_SELECT,
        vec!["?"; ids.len()].join(", ")
    );
    let mut comments_query = sqlx::query_as::<_, CommentRow>(&comments_sql).bind(viewer);
    for id in &ids {
        comments_query = comments_query.bind(*id);
    }

    let comment_rows = comments_query.fetch_all(pool).await?;

    let mut tags_query = QueryBuilder::<Sqlite>::new(
        "SELECT pt.post_id, t.id, t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id IN (",
    );
    let mut separated = tags_query.separated(", ");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY t.name");

    let tag_rows: Vec<PostTagRow> = tags_query.build_query_as().fetch_all(pool).await?;

    let mut comments: HashMap<i64, Vec<CommentView>> = HashMap::new();
    for row in comment_rows {
        comments.entry(row.post_id).or_default().push(row.into());
    }

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.post_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_view(
                comments.remove(&id).unwrap_or_default(),
                tags.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

/// Loads a single post as seen by `viewer`.
pub async fn fetch_post(pool: &SqlitePool, viewer: i64, post_id: i64) -> Result<PostView, AppError> {
    let sql = format!("{} WHERE p.id = ?", POST_SELECT);
    let row: PostRow = sqlx::query_as(&sql)
        .bind(viewer)
        .bind(viewer)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let mut posts = assemble_posts(pool, viewer, vec![row]).await?;
    posts
        .pop()
        .ok_or(AppError::NotFound("Post not found".to_string()))
}

/// Loads a single comment as seen by `viewer`.
pub async fn fetch_comment(
    pool: &SqlitePool,
    viewer: i64,
    comment_id: i64,
) -> Result<CommentView, AppError> {
    let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
    let row: CommentRow = sqlx::query_as(&sql)
        .bind(viewer)
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(row.into())
}

pub async fn ensure_post_exists(pool: &SqlitePool, post_id: i64) -> Result<(), AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("Post not found".to_string()))
}
