use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::queries::{COMMENT_SELECT, ensure_post_exists, fetch_comment},
    models::{
        comment::{CommentContent, CommentLikeState, CommentRow, CommentView},
        post::{BookmarkState, LikeState},
    },
    utils::jwt::{Claims, Viewer},
};

async fn post_like_state(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    post_id: i64,
) -> Result<LikeState, AppError> {
    let (liked, likes): (bool, i64) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM post_likes WHERE post_id = ? AND user_id = ?),
            (SELECT COUNT(*) FROM post_likes WHERE post_id = ?)
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(post_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(LikeState { liked, likes })
}

async fn comment_like_state(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    comment_id: i64,
) -> Result<CommentLikeState, AppError> {
    let (has_liked, likes_count): (bool, i64) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM comment_likes WHERE comment_id = ? AND user_id = ?),
            (SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?)
        "#,
    )
    .bind(comment_id)
    .bind(user_id)
    .bind(comment_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(CommentLikeState {
        likes_count,
        has_liked,
    })
}

/// Toggle Like on a post.
/// Responds with the authoritative state after the toggle, including likes
/// made concurrently by other users.
pub async fn toggle_like(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_post_exists(&pool, post_id).await?;

    let mut tx = pool.begin().await?;

    // 1. Unlike if a like exists, otherwise like
    let removed = sqlx::query("DELETE FROM post_likes WHERE user_id = ? AND post_id = ?")
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to like post {}: {:?}", post_id, e);
                AppError::InternalServerError(e.to_string())
            })?;
    }

    // 2. Read back the authoritative state
    let state = post_like_state(&mut tx, user_id, post_id).await?;

    tx.commit().await?;

    Ok(Json(state))
}

/// Current like state of a post for the (optional) viewer.
pub async fn like_status(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_post_exists(&pool, post_id).await?;

    let mut tx = pool.begin().await?;
    let state = post_like_state(&mut tx, viewer.id_or_anonymous(), post_id).await?;
    tx.commit().await?;

    Ok(Json(state))
}

/// Toggle Bookmark on a post.
pub async fn toggle_bookmark(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_post_exists(&pool, post_id).await?;

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND post_id = ?")
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO bookmarks (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Json(BookmarkState {
        bookmarked: removed == 0,
    }))
}

/// Current bookmark state of a post for the (optional) viewer.
pub async fn bookmark_status(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_post_exists(&pool, post_id).await?;

    let bookmarked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE post_id = ? AND user_id = ?)",
    )
    .bind(post_id)
    .bind(viewer.id_or_anonymous())
    .fetch_one(&pool)
    .await?;

    Ok(Json(BookmarkState { bookmarked }))
}

/// Create a new comment. Responds with the created comment.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentContent>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".to_string()));
    }

    let user_id = claims.user_id()?;
    ensure_post_exists(&pool, post_id).await?;

    let comment_id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (post_id, author_id, content) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&pool)
    .await?;

    let comment = fetch_comment(&pool, user_id, comment_id).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// List all comments for a post, newest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_post_exists(&pool, post_id).await?;

    let sql = format!(
        "{} WHERE c.post_id = ? ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_SELECT
    );

    let rows: Vec<CommentRow> = sqlx::query_as(&sql)
        .bind(viewer.id_or_anonymous())
        .bind(post_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(rows.into_iter().map(CommentView::from).collect::<Vec<_>>()))
}

/// Toggle Like on a comment.
pub async fn toggle_comment_like(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    comment_author(&pool, comment_id).await?;

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
        .bind(user_id)
        .bind(comment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO comment_likes (user_id, comment_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
    }

    let state = comment_like_state(&mut tx, user_id, comment_id).await?;

    tx.commit().await?;

    Ok(Json(state))
}

/// Current like state of a comment for the (optional) viewer.
pub async fn comment_like_status(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    comment_author(&pool, comment_id).await?;

    let mut tx = pool.begin().await?;
    let state = comment_like_state(&mut tx, viewer.id_or_anonymous(), comment_id).await?;
    tx.commit().await?;

    Ok(Json(state))
}

/// Edit a comment.
/// Requires: Login + (Author OR Moderator OR Admin).
pub async fn update_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<CommentContent>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".to_string()));
    }

    let user_id = claims.user_id()?;
    let author_id = comment_author(&pool, comment_id).await?;
    ensure_can_moderate(&claims, user_id, author_id)?;

    sqlx::query(
        "UPDATE comments SET content = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
    )
    .bind(content)
    .bind(comment_id)
    .execute(&pool)
    .await?;

    let comment = fetch_comment(&pool, user_id, comment_id).await?;

    Ok(Json(comment))
}

/// Delete a comment.
/// Requires: Login + (Author OR Moderator OR Admin).
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let author_id = comment_author(&pool, comment_id).await?;
    ensure_can_moderate(&claims, user_id, author_id)?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete comment: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if author_id != user_id {
        tracing::info!(comment_id, moderator = user_id, "comment removed by moderator");
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn comment_author(pool: &SqlitePool, comment_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT author_id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))
}

fn ensure_can_moderate(claims: &Claims, user_id: i64, author_id: i64) -> Result<(), AppError> {
    if author_id != user_id && !claims.role().is_elevated() {
        return Err(AppError::Forbidden(
            "You are not allowed to modify this comment".to_string(),
        ));
    }
    Ok(())
}
