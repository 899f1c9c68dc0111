use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{Profile, UpdateProfileRequest},
    utils::{jwt::Claims, slug::unique_slug},
};

const PROFILE_SELECT: &str = r#"
    SELECT
        u.id, u.name, u.slug, u.bio, u.image, u.role, u.created_at,
        (SELECT COUNT(*) FROM posts WHERE author_id = u.id AND published = 1) AS posts_count
    FROM users u
"#;

async fn fetch_profile_by_id(pool: &SqlitePool, id: i64) -> Result<Profile, AppError> {
    sqlx::query_as(&format!("{} WHERE u.id = ?", PROFILE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Public profile by slug.
pub async fn get_profile(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile: Profile = sqlx::query_as(&format!("{} WHERE u.slug = ?", PROFILE_SELECT))
        .bind(&slug)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

/// Edit the current user's profile.
///
/// Changing the display name regenerates the slug; the user's own current
/// slug never counts as a collision.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let current = fetch_profile_by_id(&pool, user_id).await?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or(current.name.clone());

    let slug = match (&name, &current.name) {
        (Some(new), old) if old.as_deref() != Some(new.as_str()) => {
            unique_slug(&pool, new, Some(user_id)).await?
        }
        _ => current.slug.clone(),
    };

    let bio = payload.bio.or(current.bio);
    let image = payload.image_url.or(current.image);

    sqlx::query(
        r#"
        UPDATE users
        SET name = ?, slug = ?, bio = ?, image = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&slug)
    .bind(&bio)
    .bind(&image)
    .bind(user_id)
    .execute(&pool)
    .await?;

    tracing::info!(user_id, %slug, "profile updated");

    Ok(Json(fetch_profile_by_id(&pool, user_id).await?))
}
