//! Client-side feed engine: renders a paginated post feed and applies the
//! viewer's interactions optimistically, reconciling with the server's answers.

pub mod api;
pub mod error;
pub mod feed;
pub mod mutation;
pub mod pagination;
pub mod scroll;
pub mod session;
pub mod store;

pub use api::{ClientConfig, FeedApi, HttpFeedApi};
pub use error::ClientError;
pub use feed::{Feed, Notice, Outcome};
pub use pagination::PageCursor;
pub use scroll::InfiniteScroll;
pub use session::{Session, Viewer};
pub use store::FeedView;
