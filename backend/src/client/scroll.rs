use std::sync::{Arc, Weak};

use super::{
    error::ClientError,
    feed::{Feed, Outcome},
};

/// Edge detector for the last rendered item's visibility.
///
/// Fires once per transition into view; re-arms when the item leaves view or
/// when a different item becomes the last one. A visible item that could not
/// fire (loading, nothing more) stays armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSensor {
    tracked: Option<i64>,
    armed: bool,
}

impl Default for ScrollSensor {
    fn default() -> Self {
        Self {
            tracked: None,
            armed: true,
        }
    }
}

impl ScrollSensor {
    pub fn observe(&mut self, item: i64, visible: bool, loading: bool, has_more: bool) -> bool {
        if self.tracked != Some(item) {
            self.tracked = Some(item);
            self.armed = true;
        }

        if !visible {
            self.armed = true;
            return false;
        }

        if self.armed && !loading && has_more {
            self.armed = false;
            return true;
        }

        false
    }
}

/// Infinite-scroll trigger bound to a feed.
///
/// Holds only a weak reference: once the feed is dropped, torn down, or the
/// trigger is detached, visibility events do nothing.
#[derive(Debug)]
pub struct InfiniteScroll {
    feed: Option<Weak<Feed>>,
    sensor: ScrollSensor,
}

impl InfiniteScroll {
    pub fn attach(feed: &Arc<Feed>) -> Self {
        Self {
            feed: Some(Arc::downgrade(feed)),
            sensor: ScrollSensor::default(),
        }
    }

    pub fn detach(&mut self) {
        self.feed = None;
    }

    pub fn is_attached(&self) -> bool {
        self.feed
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|feed| !feed.is_torn_down())
    }

    /// Reports the last item's visibility. Returns the load result when this
    /// event triggered `load_more`, `Ok(Outcome::Ignored)` otherwise.
    pub async fn on_visibility(&mut self, item: i64, visible: bool) -> Result<Outcome, ClientError> {
        let Some(feed) = self.feed.as_ref().and_then(Weak::upgrade) else {
            return Ok(Outcome::Ignored);
        };
        if feed.is_torn_down() {
            self.detach();
            return Ok(Outcome::Ignored);
        }

        let view = feed.view();
        if !self.sensor.observe(item, visible, view.loading(), view.has_more()) {
            return Ok(Outcome::Ignored);
        }

        tracing::debug!(item, "last feed item visible, loading more");
        feed.load_more().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_while_item_stays_visible() {
        let mut sensor = ScrollSensor::default();
        assert!(sensor.observe(10, true, false, true));
        assert!(!sensor.observe(10, true, false, true));
        assert!(!sensor.observe(10, true, false, true));
    }

    #[test]
    fn rearms_after_leaving_view() {
        let mut sensor = ScrollSensor::default();
        assert!(sensor.observe(10, true, false, true));
        assert!(!sensor.observe(10, false, false, true));
        assert!(sensor.observe(10, true, false, true));
    }

    #[test]
    fn rearms_when_the_last_item_changes() {
        let mut sensor = ScrollSensor::default();
        assert!(sensor.observe(10, true, false, true));
        assert!(sensor.observe(20, true, false, true));
    }

    #[test]
    fn blocked_events_keep_the_sensor_armed() {
        let mut sensor = ScrollSensor::default();
        assert!(!sensor.observe(10, true, true, true));
        assert!(!sensor.observe(10, true, false, false));
        assert!(sensor.observe(10, true, false, true));
    }
}
