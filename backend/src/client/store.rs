//! Feed state and the pure functions that update it.
//!
//! Every update builds a new `Arc<Vec<PostView>>`; the previous list is never
//! mutated, so anything holding an old snapshot keeps seeing the old data and
//! `Arc::ptr_eq` tells subscribers whether the list changed.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::watch;

use super::{error::ClientError, pagination::Pagination};
use crate::models::{comment::CommentView, post::PostView};

pub type PostList = Arc<Vec<PostView>>;

/// Replaces the whole list (page 1 or reset).
pub fn replace_all(posts: Vec<PostView>) -> PostList {
    Arc::new(posts)
}

/// Appends a later page. Posts already present (shifted by inserts on the
/// server between page loads) are skipped.
pub fn append(current: &[PostView], page: Vec<PostView>) -> PostList {
    let mut posts = Vec::with_capacity(current.len() + page.len());
    posts.extend_from_slice(current);
    for post in page {
        if !posts.iter().any(|p| p.id == post.id) {
            posts.push(post);
        }
    }
    Arc::new(posts)
}

/// Applies `patch` to one post. `None` when the post is not in the list.
pub fn patch_one(
    current: &[PostView],
    post_id: i64,
    patch: impl FnOnce(&mut PostView),
) -> Option<PostList> {
    let index = current.iter().position(|p| p.id == post_id)?;
    let mut posts = current.to_vec();
    patch(&mut posts[index]);
    Some(Arc::new(posts))
}

/// Removes one post. `None` when the post is not in the list.
pub fn remove_one(current: &[PostView], post_id: i64) -> Option<PostList> {
    if !current.iter().any(|p| p.id == post_id) {
        return None;
    }
    Some(Arc::new(
        current.iter().filter(|p| p.id != post_id).cloned().collect(),
    ))
}

pub fn find_post(posts: &[PostView], post_id: i64) -> Option<&PostView> {
    posts.iter().find(|p| p.id == post_id)
}

pub fn find_comment(posts: &[PostView], post_id: i64, comment_id: i64) -> Option<&CommentView> {
    find_post(posts, post_id)?
        .comments
        .iter()
        .find(|c| c.id == comment_id)
}

/// What the render layer sees.
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    pub posts: PostList,
    pub pagination: Pagination,
    /// Feed-level load error; replaces the whole list when set.
    pub error: Option<ClientError>,
    /// Unsent comment text per post id.
    pub new_comments: Arc<HashMap<i64, String>>,
}

impl FeedView {
    pub fn seeded(posts: Vec<PostView>, pagination: Pagination) -> Self {
        Self {
            posts: replace_all(posts),
            pagination,
            error: None,
            new_comments: Arc::default(),
        }
    }

    pub fn loading(&self) -> bool {
        self.pagination.loading()
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    /// Posts to render: nothing at all while a feed-level error is shown.
    pub fn rendered_posts(&self) -> &[PostView] {
        if self.error.is_some() {
            &[]
        } else {
            &self.posts
        }
    }

    pub fn post(&self, post_id: i64) -> Option<&PostView> {
        find_post(&self.posts, post_id)
    }

    pub fn comment(&self, post_id: i64, comment_id: i64) -> Option<&CommentView> {
        find_comment(&self.posts, post_id, comment_id)
    }

    pub fn draft(&self, post_id: i64) -> &str {
        self.new_comments
            .get(&post_id)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn last_post_id(&self) -> Option<i64> {
        self.posts.last().map(|p| p.id)
    }
}

/// Single owner of the feed state. Updates run inside the watch channel's
/// lock, so a snapshot and the change derived from it are one step.
#[derive(Debug)]
pub struct FeedStore {
    state: watch::Sender<FeedView>,
}

impl FeedStore {
    pub fn new(view: FeedView) -> Self {
        let (state, _) = watch::channel(view);
        Self { state }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FeedView {
        self.state.borrow().clone()
    }

    /// Runs `modify` atomically; subscribers are notified when it returns `true`.
    pub fn update(&self, modify: impl FnOnce(&mut FeedView) -> bool) -> bool {
        self.state.send_if_modified(modify)
    }

    pub fn patch_one(&self, post_id: i64, patch: impl FnOnce(&mut PostView)) -> bool {
        self.update(|view| match patch_one(&view.posts, post_id, patch) {
            Some(posts) => {
                view.posts = posts;
                true
            }
            None => false,
        })
    }

    pub fn remove_one(&self, post_id: i64) -> bool {
        self.update(|view| match remove_one(&view.posts, post_id) {
            Some(posts) => {
                view.posts = posts;
                true
            }
            None => false,
        })
    }

    /// Records a keystroke in a post's comment box.
    pub fn set_draft(&self, post_id: i64, text: impl Into<String>) {
        let text = text.into();
        self.update(|view| {
            let mut drafts = (*view.new_comments).clone();
            drafts.insert(post_id, text);
            view.new_comments = Arc::new(drafts);
            true
        });
    }

    pub fn clear_draft(&self, post_id: i64) {
        self.update(|view| {
            if !view.new_comments.contains_key(&post_id) {
                return false;
            }
            let mut drafts = (*view.new_comments).clone();
            drafts.remove(&post_id);
            view.new_comments = Arc::new(drafts);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{post::PostKind, user::Author};

    fn post(id: i64) -> PostView {
        PostView {
            id,
            title: format!("Post {}", id),
            content: "<p>body</p>".to_string(),
            kind: PostKind::Regular,
            image_url: None,
            published: true,
            created_at: chrono::Utc::now(),
            author: Author {
                id: 1,
                name: Some("Ana".to_string()),
                image: None,
                slug: "ana".to_string(),
            },
            likes: 0,
            comments_count: 0,
            has_liked: false,
            has_bookmarked: false,
            comments: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn every_update_yields_a_new_list() {
        let first = replace_all(vec![post(1), post(2)]);
        let patched = patch_one(&first, 2, |p| p.likes = 9).unwrap();

        assert!(!Arc::ptr_eq(&first, &patched));
        assert_eq!(first[1].likes, 0);
        assert_eq!(patched[1].likes, 9);
    }

    #[test]
    fn append_skips_posts_already_listed() {
        let first = replace_all(vec![post(3), post(2)]);
        let merged = append(&first, vec![post(2), post(1)]);

        let ids: Vec<i64> = merged.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn missing_posts_are_not_patched_or_removed() {
        let posts = replace_all(vec![post(1)]);
        assert!(patch_one(&posts, 5, |p| p.likes = 1).is_none());
        assert!(remove_one(&posts, 5).is_none());
        assert_eq!(remove_one(&posts, 1).unwrap().len(), 0);
    }

    #[test]
    fn store_notifies_only_on_change() {
        let store = FeedStore::new(FeedView::seeded(vec![post(1)], Pagination::default()));
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        assert!(!store.patch_one(42, |p| p.likes = 1));
        assert!(!rx.has_changed().unwrap());

        assert!(store.patch_one(1, |p| p.likes = 1));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn drafts_are_kept_per_post() {
        let store = FeedStore::new(FeedView::default());
        store.set_draft(1, "Loved it");
        store.set_draft(2, "Meh");
        store.clear_draft(1);

        let view = store.snapshot();
        assert_eq!(view.draft(1), "");
        assert_eq!(view.draft(2), "Meh");
    }

    #[test]
    fn error_hides_the_whole_list() {
        let mut view = FeedView::seeded(vec![post(1)], Pagination::default());
        assert_eq!(view.rendered_posts().len(), 1);

        view.error = Some(ClientError::Network("offline".into()));
        assert!(view.rendered_posts().is_empty());
    }
}
