// tests/profile_tests.rs

use std::str::FromStr;

use reading_club::{config::Config, routes, state::AppState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

async fn spawn_app() -> String {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "profile_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

#[tokio::test]
async fn test_profile_complex_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. Setup User A and User B, both named after the same author
    let user_a = format!("ua_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let user_b = format!("ub_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let mut slugs = Vec::new();
    for u in [&user_a, &user_b] {
        let registered = client
            .post(format!("{}/api/auth/register", address))
            .json(&serde_json::json!({"username": u, "password": password, "name": "José Saramago"}))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        slugs.push(registered["slug"].as_str().unwrap().to_string());
    }

    assert_eq!(slugs, vec!["jose-saramago".to_string(), "jose-saramago-1".to_string()]);

    // Login A
    let login_a = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": user_a, "password": password}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let token_a = login_a["token"].as_str().unwrap();
    assert_eq!(login_a["type"], "Bearer");
    assert_eq!(login_a["user"]["role"], "user");

    // 2. User A creates 2 posts, one of them unpublished
    for (i, published) in [(1, true), (2, false)] {
        let response = client
            .post(format!("{}/api/posts", address))
            .header("Authorization", format!("Bearer {}", token_a))
            .json(&serde_json::json!({
                "title": format!("A Post {}", i),
                "content": "Ensaio sobre a cegueira",
                "published": published
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    // 3. Public profile by slug counts published posts only
    let profile_a = client
        .get(format!("{}/api/users/{}", address, slugs[0]))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(profile_a["name"], "José Saramago");
    assert_eq!(profile_a["postsCount"], 1);

    let feed = client
        .get(format!("{}/api/posts", address))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(feed["posts"].as_array().unwrap().len(), 1);

    // 4. Renaming A regenerates the slug
    let updated = client
        .patch(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"name": "Cecília Meireles", "bio": "Poet"}))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);

    let updated = updated.json::<serde_json::Value>().await.unwrap();
    assert_eq!(updated["slug"], "cecilia-meireles");
    assert_eq!(updated["bio"], "Poet");

    // 5. The old slug is free again, the new one resolves
    let old = client
        .get(format!("{}/api/users/{}", address, slugs[0]))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status().as_u16(), 404);

    let new = client
        .get(format!("{}/api/users/cecilia-meireles", address))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status().as_u16(), 200);

    // 6. Invalid image URLs are rejected
    let invalid = client
        .patch(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"imageUrl": "not a url"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
}
