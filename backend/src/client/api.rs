use std::env;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use super::{error::ClientError, pagination::PageCursor, session::Session};
use crate::models::{
    comment::{CommentContent, CommentLikeState, CommentView},
    post::{BookmarkState, LikeState, PAGE_SIZE, PostPage},
    user::{LoginRequest, LoginResponse},
};

/// Where the backend lives and how large a feed page is.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub page_size: u32,
}

impl ClientConfig {
    /// `base_url` may point below the host root (`http://host/club`); it is
    /// normalized to end with `/` so API paths join under it.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            page_size: PAGE_SIZE,
        }
    }

    /// Reads `READING_CLUB_API_URL` (default `http://127.0.0.1:3000`).
    pub fn from_env() -> Result<Self, url::ParseError> {
        let raw = env::var("READING_CLUB_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        Ok(Self::new(Url::parse(&raw)?))
    }
}

/// The backend operations the feed engine consumes.
///
/// Implementations classify every failure into [`ClientError`]; the engine
/// never sees raw transport errors.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn fetch_posts(&self, cursor: PageCursor) -> Result<PostPage, ClientError>;

    async fn toggle_post_like(&self, post_id: i64) -> Result<LikeState, ClientError>;

    async fn post_like_status(&self, post_id: i64) -> Result<LikeState, ClientError>;

    async fn toggle_bookmark(&self, post_id: i64) -> Result<BookmarkState, ClientError>;

    async fn bookmark_status(&self, post_id: i64) -> Result<BookmarkState, ClientError>;

    async fn create_comment(&self, post_id: i64, content: &str) -> Result<CommentView, ClientError>;

    async fn toggle_comment_like(&self, comment_id: i64) -> Result<CommentLikeState, ClientError>;

    async fn comment_like_status(&self, comment_id: i64) -> Result<CommentLikeState, ClientError>;

    async fn update_comment(&self, comment_id: i64, content: &str) -> Result<CommentView, ClientError>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), ClientError>;
}

/// [`FeedApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpFeedApi {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpFeedApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Logs in and returns an authenticated client together with the session
    /// the feed should be bound to.
    pub async fn sign_in(
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<(Self, Session), ClientError> {
        let api = Self::new(config);
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let login: LoginResponse = api
            .decode(api.request(Method::POST, "api/auth/login")?.json(&body).send().await?)
            .await?;

        tracing::info!(user_id = login.user.id, role = login.user.role.as_str(), "signed in");

        let session = Session::signed_in(login.user.id, login.user.role);
        Ok((api.with_token(login.token), session))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ClientError> {
        let response = self.request(method, path)?.send().await?;
        self.decode(response).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.request(method, path)?.json(body).send().await?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ClientError> {
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Turns non-success responses into a classified error, reading the
    /// server's `{"error": ...}` body when there is one.
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.to_string());

        tracing::debug!(%status, %message, "request rejected");
        Err(ClientError::from_status(status, message))
    }
}

#[async_trait]
impl FeedApi for HttpFeedApi {
    async fn fetch_posts(&self, cursor: PageCursor) -> Result<PostPage, ClientError> {
        let path = format!("api/posts?page={}&limit={}", cursor.page, cursor.limit);
        self.send(Method::GET, &path).await
    }

    async fn toggle_post_like(&self, post_id: i64) -> Result<LikeState, ClientError> {
        self.send(Method::POST, &format!("api/posts/{}/like", post_id)).await
    }

    async fn post_like_status(&self, post_id: i64) -> Result<LikeState, ClientError> {
        self.send(Method::GET, &format!("api/posts/{}/like", post_id)).await
    }

    async fn toggle_bookmark(&self, post_id: i64) -> Result<BookmarkState, ClientError> {
        self.send(Method::POST, &format!("api/posts/{}/bookmark", post_id)).await
    }

    async fn bookmark_status(&self, post_id: i64) -> Result<BookmarkState, ClientError> {
        self.send(Method::GET, &format!("api/posts/{}/bookmark", post_id)).await
    }

    async fn create_comment(&self, post_id: i64, content: &str) -> Result<CommentView, ClientError> {
        let body = CommentContent {
            content: content.to_string(),
        };
        self.send_json(Method::POST, &format!("api/posts/{}/comment", post_id), &body)
            .await
    }

    async fn toggle_comment_like(&self, comment_id: i64) -> Result<CommentLikeState, ClientError> {
        self.send(Method::POST, &format!("api/comments/{}/like", comment_id)).await
    }

    async fn comment_like_status(&self, comment_id: i64) -> Result<CommentLikeState, ClientError> {
        self.send(Method::GET, &format!("api/comments/{}/like", comment_id)).await
    }

    async fn update_comment(&self, comment_id: i64, content: &str) -> Result<CommentView, ClientError> {
        let body = CommentContent {
            content: content.to_string(),
        };
        self.send_json(Method::PUT, &format!("api/comments/{}", comment_id), &body)
            .await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("api/comments/{}", comment_id))?
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_its_path_prefix() {
        let config = ClientConfig::new(Url::parse("http://club.example/reading").unwrap());
        assert_eq!(config.base_url.as_str(), "http://club.example/reading/");

        let api = HttpFeedApi::new(&config);
        let request = api
            .request(Method::GET, "api/posts?page=1&limit=10")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://club.example/reading/api/posts?page=1&limit=10"
        );
    }

    #[test]
    fn host_root_is_left_alone() {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:3000").unwrap());
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:3000/");
    }
}
