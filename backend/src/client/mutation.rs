//! Optimistic mutations as paired forward/inverse commands.
//!
//! A [`Command`] is built from a snapshot of the current state. `apply` and
//! `invert` carry absolute values (never deltas), so applying `invert` after
//! `apply` restores the snapshot exactly, whatever happened in between.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use super::store::{PostList, patch_one};
use crate::models::{comment::CommentView, post::PostView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Post(i64),
    Comment(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Like,
    Bookmark,
    Comment,
    Edit,
    Delete,
}

/// Identifies one in-flight remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardKey {
    pub resource: Resource,
    pub action: Action,
}

impl GuardKey {
    pub fn post(post_id: i64, action: Action) -> Self {
        Self {
            resource: Resource::Post(post_id),
            action,
        }
    }

    pub fn comment(comment_id: i64, action: Action) -> Self {
        Self {
            resource: Resource::Comment(comment_id),
            action,
        }
    }
}

/// One state transition on the post list.
///
/// Flag and counter travel in the same variant so they always change in a
/// single update.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    PostLike { post_id: i64, liked: bool, likes: i64 },
    Bookmark { post_id: i64, bookmarked: bool },
    CommentLike { post_id: i64, comment_id: i64, liked: bool, likes: i64 },
    ReplaceComment { post_id: i64, comment: CommentView },
    /// Inserts at `index` (clamped) and bumps the post's comment counter.
    InsertComment { post_id: i64, index: usize, comment: CommentView },
    /// Removes the comment and lowers the post's comment counter.
    RemoveComment { post_id: i64, comment_id: i64 },
    RemovePost { post_id: i64 },
}

impl Patch {
    /// Returns the patched list, or `None` when the target is not present.
    pub fn apply(&self, posts: &[PostView]) -> Option<PostList> {
        match self {
            Patch::PostLike { post_id, liked, likes } => patch_one(posts, *post_id, |post| {
                post.has_liked = *liked;
                post.likes = *likes;
            }),
            Patch::Bookmark { post_id, bookmarked } => patch_one(posts, *post_id, |post| {
                post.has_bookmarked = *bookmarked;
            }),
            Patch::CommentLike {
                post_id,
                comment_id,
                liked,
                likes,
            } => {
                let post = posts.iter().find(|p| p.id == *post_id)?;
                post.comments.iter().find(|c| c.id == *comment_id)?;
                patch_one(posts, *post_id, |post| {
                    if let Some(comment) = post.comments.iter_mut().find(|c| c.id == *comment_id) {
                        comment.has_liked = *liked;
                        comment.likes = *likes;
                    }
                })
            }
            Patch::ReplaceComment { post_id, comment } => {
                let post = posts.iter().find(|p| p.id == *post_id)?;
                post.comments.iter().find(|c| c.id == comment.id)?;
                patch_one(posts, *post_id, |post| {
                    if let Some(slot) = post.comments.iter_mut().find(|c| c.id == comment.id) {
                        *slot = comment.clone();
                    }
                })
            }
            Patch::InsertComment {
                post_id,
                index,
                comment,
            } => {
                let post = posts.iter().find(|p| p.id == *post_id)?;
                if post.comments.iter().any(|c| c.id == comment.id) {
                    return None;
                }
                patch_one(posts, *post_id, |post| {
                    let at = (*index).min(post.comments.len());
                    post.comments.insert(at, comment.clone());
                    post.comments_count += 1;
                })
            }
            Patch::RemoveComment {
                post_id,
                comment_id,
            } => {
                let post = posts.iter().find(|p| p.id == *post_id)?;
                post.comments.iter().find(|c| c.id == *comment_id)?;
                patch_one(posts, *post_id, |post| {
                    post.comments.retain(|c| c.id != *comment_id);
                    post.comments_count = (post.comments_count - 1).max(0);
                })
            }
            Patch::RemovePost { post_id } => super::store::remove_one(posts, *post_id),
        }
    }
}

/// A mutation's optimistic change together with its exact inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub apply: Patch,
    pub invert: Patch,
}

impl Command {
    pub fn toggle_post_like(post: &PostView) -> Self {
        let liked = !post.has_liked;
        Self {
            apply: Patch::PostLike {
                post_id: post.id,
                liked,
                likes: if liked { post.likes + 1 } else { (post.likes - 1).max(0) },
            },
            invert: Patch::PostLike {
                post_id: post.id,
                liked: post.has_liked,
                likes: post.likes,
            },
        }
    }

    pub fn toggle_bookmark(post: &PostView) -> Self {
        Self {
            apply: Patch::Bookmark {
                post_id: post.id,
                bookmarked: !post.has_bookmarked,
            },
            invert: Patch::Bookmark {
                post_id: post.id,
                bookmarked: post.has_bookmarked,
            },
        }
    }

    pub fn toggle_comment_like(post_id: i64, comment: &CommentView) -> Self {
        let liked = !comment.has_liked;
        Self {
            apply: Patch::CommentLike {
                post_id,
                comment_id: comment.id,
                liked,
                likes: if liked { comment.likes + 1 } else { (comment.likes - 1).max(0) },
            },
            invert: Patch::CommentLike {
                post_id,
                comment_id: comment.id,
                liked: comment.has_liked,
                likes: comment.likes,
            },
        }
    }

    pub fn edit_comment(post_id: i64, comment: &CommentView, content: impl Into<String>) -> Self {
        let mut edited = comment.clone();
        edited.content = content.into();
        Self {
            apply: Patch::ReplaceComment {
                post_id,
                comment: edited,
            },
            invert: Patch::ReplaceComment {
                post_id,
                comment: comment.clone(),
            },
        }
    }

    /// `None` when the comment is not on the post.
    pub fn delete_comment(post: &PostView, comment_id: i64) -> Option<Self> {
        let index = post.comments.iter().position(|c| c.id == comment_id)?;
        Some(Self {
            apply: Patch::RemoveComment {
                post_id: post.id,
                comment_id,
            },
            invert: Patch::InsertComment {
                post_id: post.id,
                index,
                comment: post.comments[index].clone(),
            },
        })
    }
}

/// Set of remote calls currently in flight, keyed by (resource, action).
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<GuardKey>>>,
}

impl InFlight {
    /// Claims `key`. Returns `None` when a call for the same key is running;
    /// the claim is released when the ticket is dropped.
    pub fn try_acquire(&self, key: GuardKey) -> Option<InFlightTicket> {
        let inserted = self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);

        inserted.then(|| InFlightTicket {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn contains(&self, key: GuardKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

#[derive(Debug)]
pub struct InFlightTicket {
    keys: Arc<Mutex<HashSet<GuardKey>>>,
    key: GuardKey,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{post::PostKind, user::Author};

    fn author(id: i64) -> Author {
        Author {
            id,
            name: None,
            image: None,
            slug: format!("reader-{}", id),
        }
    }

    fn comment(id: i64, post_id: i64) -> CommentView {
        CommentView {
            id,
            post_id,
            content: format!("comment {}", id),
            created_at: chrono::Utc::now(),
            author: author(2),
            likes: 1,
            has_liked: false,
        }
    }

    fn post(id: i64, likes: i64, has_liked: bool) -> PostView {
        PostView {
            id,
            title: "Grande Sertão".to_string(),
            content: "<p>Nonada.</p>".to_string(),
            kind: PostKind::Study,
            image_url: None,
            published: true,
            created_at: chrono::Utc::now(),
            author: author(1),
            likes,
            comments_count: 2,
            has_liked,
            has_bookmarked: false,
            comments: vec![comment(10, id), comment(11, id)],
            tags: Vec::new(),
        }
    }

    #[test]
    fn like_command_flips_flag_and_counter_together() {
        let posts = vec![post(1, 3, false)];
        let command = Command::toggle_post_like(&posts[0]);

        let applied = command.apply.apply(&posts).unwrap();
        assert_eq!((applied[0].likes, applied[0].has_liked), (4, true));

        let reverted = command.invert.apply(&applied).unwrap();
        assert_eq!((reverted[0].likes, reverted[0].has_liked), (3, false));
    }

    #[test]
    fn unlike_never_goes_negative() {
        let posts = vec![post(1, 0, true)];
        let command = Command::toggle_post_like(&posts[0]);
        let applied = command.apply.apply(&posts).unwrap();
        assert_eq!((applied[0].likes, applied[0].has_liked), (0, false));
    }

    #[test]
    fn deleted_comment_is_restored_at_its_position() {
        let posts = vec![post(1, 0, false)];
        let command = Command::delete_comment(&posts[0], 11).unwrap();

        let applied = command.apply.apply(&posts).unwrap();
        assert_eq!(applied[0].comments.len(), 1);
        assert_eq!(applied[0].comments_count, 1);

        let restored = command.invert.apply(&applied).unwrap();
        assert_eq!(restored[0], posts[0]);
    }

    #[test]
    fn edit_is_reverted_to_the_original_text() {
        let posts = vec![post(1, 0, false)];
        let command = Command::edit_comment(1, &posts[0].comments[0], "rewritten");

        let applied = command.apply.apply(&posts).unwrap();
        assert_eq!(applied[0].comments[0].content, "rewritten");

        let restored = command.invert.apply(&applied).unwrap();
        assert_eq!(restored[0].comments[0].content, "comment 10");
    }

    #[test]
    fn patches_on_missing_targets_are_no_ops() {
        let posts = vec![post(1, 0, false)];
        assert!(Patch::PostLike { post_id: 9, liked: true, likes: 1 }.apply(&posts).is_none());
        assert!(
            Patch::RemoveComment { post_id: 1, comment_id: 99 }
                .apply(&posts)
                .is_none()
        );
    }

    #[test]
    fn ticket_holds_the_key_until_dropped() {
        let in_flight = InFlight::default();
        let key = GuardKey::post(1, Action::Like);

        let ticket = in_flight.try_acquire(key).unwrap();
        assert!(in_flight.try_acquire(key).is_none());
        assert!(in_flight.try_acquire(GuardKey::post(1, Action::Bookmark)).is_some());

        drop(ticket);
        assert!(!in_flight.contains(key));
        assert!(in_flight.try_acquire(key).is_some());
    }
}
