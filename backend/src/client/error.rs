use reqwest::StatusCode;
use thiserror::Error;

/// Every failure the feed engine can surface, already classified for the
/// render layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No session, or the server rejected it. The viewer must sign in.
    #[error("sign in required")]
    AuthRequired,

    #[error("{0}")]
    Validation(String),

    /// Authenticated, but neither the author nor a moderator.
    #[error("you are not permitted to do that")]
    PermissionDenied,

    /// The resource was deleted concurrently.
    #[error("this content no longer exists")]
    NotFound,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

impl ClientError {
    /// Classifies a non-success response.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::AuthRequired,
            StatusCode::FORBIDDEN => ClientError::PermissionDenied,
            StatusCode::NOT_FOUND => ClientError::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            other => ClientError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }

    /// The "NetworkOrServerError" class: generic failures shown as a toast.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Server { .. } | ClientError::Network(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        assert_eq!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            ClientError::AuthRequired
        );
        assert_eq!(
            ClientError::from_status(StatusCode::FORBIDDEN, String::new()),
            ClientError::PermissionDenied
        );
        assert_eq!(
            ClientError::from_status(StatusCode::NOT_FOUND, String::new()),
            ClientError::NotFound
        );
        assert_eq!(
            ClientError::from_status(StatusCode::BAD_REQUEST, "empty".into()),
            ClientError::Validation("empty".into())
        );
        assert!(ClientError::from_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
    }
}
