use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::queries::{POST_SELECT, assemble_posts, fetch_post},
    models::post::{CreatePostRequest, PostListParams, PostPage, PostRow},
    utils::{
        html::clean_html,
        jwt::{Claims, Viewer},
    },
};

/// Create a new post.
/// Requires: Login.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Validate payload
    payload.validate()?;
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be blank".to_string()));
    }

    let user_id = claims.user_id()?;
    let content = clean_html(&payload.content);

    let mut tx = pool.begin().await?;

    // 2. Insert Post
    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, title, content, kind, image_url, published)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(payload.title.trim())
    .bind(&content)
    .bind(payload.kind.as_str())
    .bind(&payload.image_url)
    .bind(payload.published.unwrap_or(true))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // 3. Attach tags, creating unknown ones on the fly
    for name in payload.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
        )
        .bind(post_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(post_id, author = user_id, "post created");

    let post = fetch_post(&pool, user_id, post_id).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// List published posts, newest first, one page at a time.
///
/// Fetches one row beyond the page size; its presence is what sets `hasMore`.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = params.window();
    let viewer = viewer.id_or_anonymous();

    let sql = format!(
        "{} WHERE p.published = 1 ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_SELECT
    );

    let mut rows: Vec<PostRow> = sqlx::query_as(&sql)
        .bind(viewer)
        .bind(viewer)
        .bind(i64::from(limit) + 1)
        .bind(i64::from(offset))
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list posts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let has_more = rows.len() > limit as usize;
    rows.truncate(limit as usize);

    let posts = assemble_posts(&pool, viewer, rows).await?;

    Ok(Json(PostPage { posts, has_more }))
}

/// Get a single post by ID.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, viewer.id_or_anonymous(), id).await?;
    Ok(Json(post))
}

/// List posts bookmarked by the current user, most recently saved first.
pub async fn list_saved_posts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let (limit, offset) = params.window();

    let sql = format!(
        "{} JOIN bookmarks saved ON saved.post_id = p.id AND saved.user_id = ? \
         ORDER BY saved.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_SELECT
    );

    let mut rows: Vec<PostRow> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(i64::from(limit) + 1)
        .bind(i64::from(offset))
        .fetch_all(&pool)
        .await?;

    let has_more = rows.len() > limit as usize;
    rows.truncate(limit as usize);

    let posts = assemble_posts(&pool, user_id, rows).await?;

    Ok(Json(PostPage { posts, has_more }))
}
