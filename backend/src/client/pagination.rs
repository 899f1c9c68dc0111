use crate::models::post::PAGE_SIZE;

/// Offset pagination unit: 1-based page number plus fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub limit: u32,
}

impl PageCursor {
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::first(PAGE_SIZE)
    }
}

/// Page-loading state machine.
///
/// `cursor` is the last committed page. At most one page request is in flight;
/// page N+1 is only handed out after page N was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    cursor: PageCursor,
    loading: bool,
    has_more: bool,
    /// Nothing committed yet (fresh feed or after a reset).
    pristine: bool,
}

impl Pagination {
    pub fn new(limit: u32) -> Self {
        Self {
            cursor: PageCursor::first(limit),
            loading: false,
            has_more: true,
            pristine: true,
        }
    }

    /// State of a feed seeded with a server-rendered first page.
    pub fn seeded(limit: u32, has_more: bool) -> Self {
        Self {
            cursor: PageCursor::first(limit),
            loading: false,
            has_more,
            pristine: false,
        }
    }

    /// Same state with a different page size for the requests still to come.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.cursor.limit = limit;
        self
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Starts a page-1 load. Returns `None` while another load is in flight.
    pub fn begin_initial(&mut self) -> Option<PageCursor> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(PageCursor::first(self.cursor.limit))
    }

    /// Starts loading the page after the last committed one.
    /// Returns `None` (no request) while loading or when there is nothing more.
    pub fn begin_more(&mut self) -> Option<PageCursor> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(if self.pristine {
            PageCursor::first(self.cursor.limit)
        } else {
            self.cursor.next()
        })
    }

    /// Records a successfully applied page.
    pub fn commit(&mut self, cursor: PageCursor, has_more: bool) {
        self.cursor = cursor;
        self.has_more = has_more;
        self.loading = false;
        self.pristine = false;
    }

    /// Ends a failed load without moving the cursor.
    pub fn fail(&mut self) {
        self.loading = false;
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_request_at_a_time() {
        let mut pagination = Pagination::new(10);

        let first = pagination.begin_initial().unwrap();
        assert_eq!(first, PageCursor::first(10));
        assert!(pagination.begin_more().is_none());
        assert!(pagination.begin_initial().is_none());

        pagination.commit(first, true);
        assert_eq!(pagination.begin_more(), Some(PageCursor { page: 2, limit: 10 }));
    }

    #[test]
    fn exhausted_feed_hands_out_nothing() {
        let mut pagination = Pagination::new(10);
        let first = pagination.begin_initial().unwrap();
        pagination.commit(first, false);

        assert!(pagination.begin_more().is_none());
        assert!(!pagination.loading());
    }

    #[test]
    fn failure_keeps_the_cursor() {
        let mut pagination = Pagination::seeded(10, true);
        let second = pagination.begin_more().unwrap();
        assert_eq!(second.page, 2);

        pagination.fail();
        assert!(!pagination.loading());
        assert_eq!(pagination.cursor().page, 1);
        assert_eq!(pagination.begin_more().unwrap().page, 2);
    }

    #[test]
    fn load_more_on_a_pristine_feed_starts_at_page_one() {
        let mut pagination = Pagination::new(10);
        assert_eq!(pagination.begin_more().unwrap().page, 1);
    }
}
