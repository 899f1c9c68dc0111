// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, community, interaction, profile},
    state::AppState,
    utils::jwt::{auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Public read routes see an optional session (viewer-relative flags).
/// * Mutating routes require a valid bearer token (401 otherwise).
/// * Session middleware is a route layer, so unknown paths still fall
///   through to the 404 fallback.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let public_routes = Router::new()
        .route("/api/posts", get(community::list_posts))
        .route("/api/posts/{id}", get(community::get_post))
        .route("/api/posts/{id}/like", get(interaction::like_status))
        .route("/api/posts/{id}/bookmark", get(interaction::bookmark_status))
        .route("/api/posts/{id}/comment", get(interaction::list_comments))
        .route("/api/comments/{id}/like", get(interaction::comment_like_status))
        .route("/api/users/{slug}", get(profile::get_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/api/posts", post(community::create_post))
        .route("/api/posts/saved", get(community::list_saved_posts))
        .route("/api/posts/{id}/like", post(interaction::toggle_like))
        .route("/api/posts/{id}/bookmark", post(interaction::toggle_bookmark))
        .route("/api/posts/{id}/comment", post(interaction::create_comment))
        .route("/api/comments/{id}/like", post(interaction::toggle_comment_like))
        .route(
            "/api/comments/{id}",
            put(interaction::update_comment).delete(interaction::delete_comment),
        )
        .route("/api/users/me", patch(profile::update_me))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(auth_routes)
        .merge(public_routes)
        .merge(protected_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
