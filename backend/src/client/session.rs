use crate::models::{comment::CommentView, user::Role};

/// The signed-in viewer: identity plus role, as issued by the auth contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: i64,
    pub role: Role,
}

/// Session handed to a feed at construction. A feed is bound to exactly one
/// session, so viewer-relative flags are never shared across viewers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    viewer: Option<Viewer>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { viewer: None }
    }

    pub fn signed_in(id: i64, role: Role) -> Self {
        Self {
            viewer: Some(Viewer { id, role }),
        }
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.viewer
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    /// Edit/delete gate for a comment: its author, or a moderator/admin.
    pub fn can_moderate(&self, comment: &CommentView) -> bool {
        self.viewer
            .is_some_and(|v| v.id == comment.author.id || v.role.is_elevated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Author;

    fn comment_by(author_id: i64) -> CommentView {
        CommentView {
            id: 1,
            post_id: 1,
            content: "Great chapter".to_string(),
            created_at: chrono::Utc::now(),
            author: Author {
                id: author_id,
                name: None,
                image: None,
                slug: "author".to_string(),
            },
            likes: 0,
            has_liked: false,
        }
    }

    #[test]
    fn only_authors_and_elevated_roles_may_moderate() {
        let comment = comment_by(7);

        assert!(Session::signed_in(7, Role::User).can_moderate(&comment));
        assert!(Session::signed_in(8, Role::Moderator).can_moderate(&comment));
        assert!(Session::signed_in(9, Role::Admin).can_moderate(&comment));
        assert!(!Session::signed_in(10, Role::User).can_moderate(&comment));
        assert!(!Session::anonymous().can_moderate(&comment));
    }
}
