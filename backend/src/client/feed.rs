//! The feed controller: pagination, optimistic mutations and reconciliation
//! over one [`FeedStore`], bound to one viewer session.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tokio::sync::{broadcast, watch};

use super::{
    api::{ClientConfig, FeedApi},
    error::ClientError,
    mutation::{Action, Command, GuardKey, InFlight, Patch},
    pagination::{PageCursor, Pagination},
    session::{Session, Viewer},
    store::{self, FeedStore, FeedView},
};
use crate::models::{
    comment::{CommentLikeState, CommentView},
    post::{BookmarkState, LikeState, PAGE_SIZE, PostView},
};

const NOTICE_CAPACITY: usize = 64;

/// User-visible messages (toasts, inline hints, navigation requests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The viewer has to sign in; the render layer navigates to the sign-in page.
    SignInRequired,
    /// Inline validation message for a post's comment box.
    Invalid { post_id: i64, message: String },
    /// Role or ownership check failed.
    NotPermitted(String),
    Failed(String),
    Info(String),
}

/// How a call ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server answered and local state now mirrors it.
    Confirmed,
    /// Nothing was sent: the same request is already in flight, the feed
    /// cannot page further, or the target is not in the feed.
    Ignored,
    /// The answer arrived after a reset or teardown and was dropped.
    Discarded,
}

pub struct Feed {
    api: Arc<dyn FeedApi>,
    session: Session,
    store: FeedStore,
    in_flight: InFlight,
    epoch: AtomicU64,
    torn_down: AtomicBool,
    notices: broadcast::Sender<Notice>,
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("session", &self.session)
            .field("epoch", &self.epoch)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl Feed {
    /// An empty feed; call [`Feed::load_initial`] to fetch page 1.
    pub fn new(api: Arc<dyn FeedApi>, session: Session) -> Self {
        Self::with_view(api, session, FeedView::seeded(Vec::new(), Pagination::new(PAGE_SIZE)))
    }

    /// An empty feed paging with `config.page_size`.
    pub fn from_config(api: Arc<dyn FeedApi>, session: Session, config: &ClientConfig) -> Self {
        Self::new(api, session).with_page_size(config.page_size)
    }

    /// A feed seeded with a server-rendered first page.
    pub fn seeded(
        api: Arc<dyn FeedApi>,
        session: Session,
        posts: Vec<PostView>,
        has_more: bool,
    ) -> Self {
        Self::with_view(
            api,
            session,
            FeedView::seeded(posts, Pagination::seeded(PAGE_SIZE, has_more)),
        )
    }

    /// Overrides the page size (see `ClientConfig::page_size`).
    pub fn with_page_size(self, limit: u32) -> Self {
        self.store.update(|view| {
            view.pagination = view.pagination.with_limit(limit);
            true
        });
        self
    }

    fn with_view(api: Arc<dyn FeedApi>, session: Session, view: FeedView) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            api,
            session,
            store: FeedStore::new(view),
            in_flight: InFlight::default(),
            epoch: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
            notices,
        }
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// Current state snapshot.
    pub fn view(&self) -> FeedView {
        self.store.snapshot()
    }

    /// Change notifications for the render layer.
    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.store.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Whether edit/delete controls should be offered for `comment`.
    pub fn can_moderate(&self, comment: &CommentView) -> bool {
        self.session.can_moderate(comment)
    }

    pub fn is_in_flight(&self, key: GuardKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Detaches the feed from its consumer. Responses still in flight are
    /// discarded when they arrive.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("feed torn down");
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.is_torn_down() || self.epoch() != epoch
    }

    fn notify(&self, notice: Notice) {
        // No subscriber simply means nobody is rendering toasts.
        let _ = self.notices.send(notice);
    }

    fn require_auth(&self) -> Result<Viewer, ClientError> {
        self.session.viewer().ok_or_else(|| {
            self.notify(Notice::SignInRequired);
            ClientError::AuthRequired
        })
    }

    /// Converts a mutation failure into the notice the viewer sees.
    fn report(&self, err: &ClientError, context: &str) {
        let notice = match err {
            ClientError::AuthRequired => Notice::SignInRequired,
            ClientError::PermissionDenied => {
                Notice::NotPermitted("You are not permitted to do that.".to_string())
            }
            ClientError::NotFound => Notice::Failed("This content no longer exists.".to_string()),
            ClientError::Validation(message) => Notice::Failed(message.clone()),
            ClientError::Server { .. } | ClientError::Network(_) => {
                Notice::Failed(context.to_string())
            }
        };
        self.notify(notice);
    }

    // ----- pagination -------------------------------------------------------

    /// Loads page 1 and replaces the list with it.
    pub async fn load_initial(&self) -> Result<Outcome, ClientError> {
        if self.is_torn_down() {
            return Ok(Outcome::Discarded);
        }

        let mut cursor = None;
        self.store.update(|view| {
            cursor = view.pagination.begin_initial();
            cursor.is_some()
        });

        match cursor {
            Some(cursor) => self.run_page_load(cursor, self.epoch()).await,
            None => Ok(Outcome::Ignored),
        }
    }

    /// Drops everything and starts over from page 1. Responses to requests
    /// issued before the reset are discarded.
    pub async fn reset(&self) -> Result<Outcome, ClientError> {
        if self.is_torn_down() {
            return Ok(Outcome::Discarded);
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.store.update(|view| {
            *view = FeedView {
                new_comments: Arc::clone(&view.new_comments),
                ..FeedView::seeded(Vec::new(), Pagination::new(view.pagination.cursor().limit))
            };
            true
        });

        self.load_initial().await
    }

    /// Loads the next page. A no-op (zero requests) while a page is loading
    /// or when the server reported no more posts.
    pub async fn load_more(&self) -> Result<Outcome, ClientError> {
        if self.is_torn_down() {
            return Ok(Outcome::Discarded);
        }

        let mut cursor = None;
        self.store.update(|view| {
            cursor = view.pagination.begin_more();
            cursor.is_some()
        });

        match cursor {
            Some(cursor) => self.run_page_load(cursor, self.epoch()).await,
            None => Ok(Outcome::Ignored),
        }
    }

    async fn run_page_load(&self, cursor: PageCursor, epoch: u64) -> Result<Outcome, ClientError> {
        tracing::debug!(page = cursor.page, limit = cursor.limit, "loading feed page");

        let result = self.api.fetch_posts(cursor).await;

        if self.is_stale(epoch) {
            tracing::debug!(page = cursor.page, "discarding stale feed page");
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(page) => {
                let count = page.posts.len();
                self.store.update(|view| {
                    view.posts = if cursor.page == 1 {
                        store::replace_all(page.posts)
                    } else {
                        store::append(&view.posts, page.posts)
                    };
                    view.pagination.commit(cursor, page.has_more);
                    view.error = None;
                    true
                });
                tracing::info!(page = cursor.page, count, has_more = page.has_more, "feed page loaded");
                Ok(Outcome::Confirmed)
            }
            Err(err) => {
                tracing::warn!(page = cursor.page, error = %err, "feed page failed");
                self.store.update(|view| {
                    view.pagination.fail();
                    view.error = Some(err.clone());
                    true
                });
                self.report(&err, "Could not load posts.");
                Err(err)
            }
        }
    }

    // ----- optimistic mutations ---------------------------------------------

    /// Runs one optimistic mutation end to end.
    ///
    /// `build` takes the snapshot and runs in the same store update that
    /// applies the forward patch. On success `reconcile` turns the server's
    /// answer into the final state; on failure the inverse patch is applied,
    /// and `gone` as well when the server says the target no longer exists.
    async fn run_optimistic<T, Fut>(
        &self,
        key: GuardKey,
        build: impl FnOnce(&[PostView]) -> Option<Command>,
        remote: impl FnOnce() -> Fut,
        reconcile: impl FnOnce(T) -> Option<Patch>,
        gone: Patch,
        context: &str,
    ) -> Result<Outcome, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let Some(_ticket) = self.in_flight.try_acquire(key) else {
            tracing::debug!(?key, "request already in flight, dropping");
            return Ok(Outcome::Ignored);
        };

        let mut command = None;
        self.store.update(|view| {
            let Some(built) = build(&view.posts) else {
                return false;
            };
            let applied = built.apply.apply(&view.posts);
            command = Some(built);
            match applied {
                Some(posts) => {
                    view.posts = posts;
                    true
                }
                None => false,
            }
        });

        let Some(command) = command else {
            return Ok(Outcome::Ignored);
        };

        let epoch = self.epoch();
        let result = remote().await;

        if self.is_stale(epoch) {
            tracing::debug!(?key, "discarding response for a reset feed");
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(value) => {
                if let Some(patch) = reconcile(value) {
                    self.apply_patch(&patch);
                }
                Ok(Outcome::Confirmed)
            }
            Err(err) => {
                self.apply_patch(&command.invert);
                if err == ClientError::NotFound {
                    self.apply_patch(&gone);
                }
                tracing::warn!(?key, error = %err, "optimistic update reverted");
                self.report(&err, context);
                Err(err)
            }
        }
    }

    fn apply_patch(&self, patch: &Patch) -> bool {
        self.store.update(|view| match patch.apply(&view.posts) {
            Some(posts) => {
                view.posts = posts;
                true
            }
            None => false,
        })
    }

    /// Likes or unlikes a post.
    pub async fn toggle_like(&self, post_id: i64) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        self.run_optimistic(
            GuardKey::post(post_id, Action::Like),
            |posts| store::find_post(posts, post_id).map(Command::toggle_post_like),
            || self.api.toggle_post_like(post_id),
            |state: LikeState| {
                Some(Patch::PostLike {
                    post_id,
                    liked: state.liked,
                    likes: state.likes,
                })
            },
            Patch::RemovePost { post_id },
            "Could not like the post.",
        )
        .await
    }

    /// Saves or unsaves a post.
    pub async fn toggle_bookmark(&self, post_id: i64) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        let mut saved = None;
        let outcome = self
            .run_optimistic(
                GuardKey::post(post_id, Action::Bookmark),
                |posts| store::find_post(posts, post_id).map(Command::toggle_bookmark),
                || self.api.toggle_bookmark(post_id),
                |state: BookmarkState| {
                    saved = Some(state.bookmarked);
                    Some(Patch::Bookmark {
                        post_id,
                        bookmarked: state.bookmarked,
                    })
                },
                Patch::RemovePost { post_id },
                "Could not save the post.",
            )
            .await?;

        if let Some(bookmarked) = saved {
            self.notify(Notice::Info(
                if bookmarked {
                    "Post saved"
                } else {
                    "Post removed from saved"
                }
                .to_string(),
            ));
        }

        Ok(outcome)
    }

    /// Likes or unlikes a comment.
    pub async fn toggle_comment_like(&self, post_id: i64, comment_id: i64) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        self.run_optimistic(
            GuardKey::comment(comment_id, Action::Like),
            |posts| {
                store::find_comment(posts, post_id, comment_id)
                    .map(|comment| Command::toggle_comment_like(post_id, comment))
            },
            || self.api.toggle_comment_like(comment_id),
            |state: CommentLikeState| {
                Some(Patch::CommentLike {
                    post_id,
                    comment_id,
                    liked: state.has_liked,
                    likes: state.likes_count,
                })
            },
            Patch::RemoveComment {
                post_id,
                comment_id,
            },
            "Could not like the comment.",
        )
        .await
    }

    /// Records typing in a post's comment box.
    pub fn set_draft(&self, post_id: i64, text: impl Into<String>) {
        self.store.set_draft(post_id, text);
    }

    /// Sends the post's current draft as a comment.
    pub async fn submit_draft(&self, post_id: i64) -> Result<Outcome, ClientError> {
        let draft = self.view().draft(post_id).to_string();
        self.submit_comment(post_id, &draft).await
    }

    /// Creates a comment. On success it is prepended to the post's comments,
    /// the counter goes up by exactly one and the draft is cleared.
    pub async fn submit_comment(&self, post_id: i64, content: &str) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        let content = content.trim();
        if content.is_empty() {
            let message = "Comment cannot be empty".to_string();
            self.notify(Notice::Invalid {
                post_id,
                message: message.clone(),
            });
            return Err(ClientError::Validation(message));
        }

        let Some(_ticket) = self.in_flight.try_acquire(GuardKey::post(post_id, Action::Comment)) else {
            return Ok(Outcome::Ignored);
        };

        let epoch = self.epoch();
        let result = self.api.create_comment(post_id, content).await;

        if self.is_stale(epoch) {
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(comment) => {
                self.apply_patch(&Patch::InsertComment {
                    post_id,
                    index: 0,
                    comment,
                });
                self.store.clear_draft(post_id);
                Ok(Outcome::Confirmed)
            }
            Err(err) => {
                if err == ClientError::NotFound {
                    self.apply_patch(&Patch::RemovePost { post_id });
                }
                tracing::warn!(post_id, error = %err, "comment not created");
                self.report(&err, "Could not add the comment.");
                Err(err)
            }
        }
    }

    /// Checks the local permission gate for edit/delete.
    fn ensure_can_moderate(&self, post_id: i64, comment_id: i64) -> Result<bool, ClientError> {
        let view = self.store.snapshot();
        let Some(comment) = view.comment(post_id, comment_id) else {
            return Ok(false);
        };

        if !self.can_moderate(comment) {
            self.report(&ClientError::PermissionDenied, "");
            return Err(ClientError::PermissionDenied);
        }
        Ok(true)
    }

    /// Rewrites a comment's text.
    pub async fn edit_comment(
        &self,
        post_id: i64,
        comment_id: i64,
        content: &str,
    ) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        let content = content.trim().to_string();
        if content.is_empty() {
            let message = "Comment cannot be empty".to_string();
            self.notify(Notice::Invalid {
                post_id,
                message: message.clone(),
            });
            return Err(ClientError::Validation(message));
        }

        if !self.ensure_can_moderate(post_id, comment_id)? {
            return Ok(Outcome::Ignored);
        }

        let edited = content.clone();
        self.run_optimistic(
            GuardKey::comment(comment_id, Action::Edit),
            |posts| {
                store::find_comment(posts, post_id, comment_id)
                    .map(|comment| Command::edit_comment(post_id, comment, edited))
            },
            || self.api.update_comment(comment_id, &content),
            |comment: CommentView| Some(Patch::ReplaceComment { post_id, comment }),
            Patch::RemoveComment {
                post_id,
                comment_id,
            },
            "Could not edit the comment.",
        )
        .await
    }

    /// Deletes a comment, hiding it right away and restoring it in place if
    /// the server refuses.
    pub async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<Outcome, ClientError> {
        self.require_auth()?;

        if !self.ensure_can_moderate(post_id, comment_id)? {
            return Ok(Outcome::Ignored);
        }

        self.run_optimistic(
            GuardKey::comment(comment_id, Action::Delete),
            |posts| {
                store::find_post(posts, post_id)
                    .and_then(|post| Command::delete_comment(post, comment_id))
            },
            || self.api.delete_comment(comment_id),
            |()| None,
            Patch::RemoveComment {
                post_id,
                comment_id,
            },
            "Could not delete the comment.",
        )
        .await
    }

    // ----- reconciliation without a mutation --------------------------------

    /// Re-reads the viewer's like and bookmark state for one post.
    pub async fn refresh_post(&self, post_id: i64) -> Result<Outcome, ClientError> {
        if self.view().post(post_id).is_none() {
            return Ok(Outcome::Ignored);
        }

        let epoch = self.epoch();
        let result = tokio::try_join!(
            self.api.post_like_status(post_id),
            self.api.bookmark_status(post_id),
        );

        if self.is_stale(epoch) {
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok((like, bookmark)) => {
                self.store.patch_one(post_id, |post| {
                    post.likes = like.likes;
                    post.has_liked = like.liked;
                    post.has_bookmarked = bookmark.bookmarked;
                });
                Ok(Outcome::Confirmed)
            }
            Err(ClientError::NotFound) => {
                self.store.remove_one(post_id);
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Re-reads the viewer's like state for one comment.
    pub async fn refresh_comment(&self, post_id: i64, comment_id: i64) -> Result<Outcome, ClientError> {
        if self.view().comment(post_id, comment_id).is_none() {
            return Ok(Outcome::Ignored);
        }

        let epoch = self.epoch();
        let result = self.api.comment_like_status(comment_id).await;

        if self.is_stale(epoch) {
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(state) => {
                self.apply_patch(&Patch::CommentLike {
                    post_id,
                    comment_id,
                    liked: state.has_liked,
                    likes: state.likes_count,
                });
                Ok(Outcome::Confirmed)
            }
            Err(ClientError::NotFound) => {
                self.apply_patch(&Patch::RemoveComment {
                    post_id,
                    comment_id,
                });
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }
}
