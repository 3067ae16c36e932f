use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// A horizontally scrollable container the swipe engine can page.
pub trait ScrollTarget: Send {
    fn scroll_by(&mut self, dx: f64, behavior: ScrollBehavior);
}

impl<T: ScrollTarget> ScrollTarget for Arc<Mutex<T>> {
    fn scroll_by(&mut self, dx: f64, behavior: ScrollBehavior) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scroll_by(dx, behavior);
    }
}

/// A row of fixed-width buttons (e.g. the country selector) shown through a
/// narrower viewport. Scroll position is clamped to the content.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedRow {
    content_width: f64,
    viewport_width: f64,
    scroll_left: f64,
    last_behavior: Option<ScrollBehavior>,
}

impl PagedRow {
    pub fn new(content_width: f64, viewport_width: f64) -> Self {
        Self {
            content_width: content_width.max(0.0),
            viewport_width: viewport_width.max(0.0),
            scroll_left: 0.0,
            last_behavior: None,
        }
    }

    /// Row sized for `items` buttons of `item_width` each.
    pub fn for_items(items: usize, item_width: f64, viewport_width: f64) -> Self {
        Self::new(items as f64 * item_width, viewport_width)
    }

    pub fn max_scroll(&self) -> f64 {
        (self.content_width - self.viewport_width).max(0.0)
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    pub fn last_behavior(&self) -> Option<ScrollBehavior> {
        self.last_behavior
    }

    pub fn scroll_to(&mut self, x: f64) {
        self.scroll_left = x.clamp(0.0, self.max_scroll());
        self.last_behavior = Some(ScrollBehavior::Instant);
    }

    pub fn can_scroll_left(&self) -> bool {
        self.scroll_left > 0.0
    }

    pub fn can_scroll_right(&self) -> bool {
        self.scroll_left < self.max_scroll()
    }

    /// Index range of the items at least partly inside the viewport.
    pub fn visible_range(&self, item_width: f64) -> std::ops::Range<usize> {
        if item_width <= 0.0 {
            return 0..0;
        }
        let total = (self.content_width / item_width).round() as usize;
        let first = (self.scroll_left / item_width).floor() as usize;
        let last = ((self.scroll_left + self.viewport_width) / item_width).ceil() as usize;
        first.min(total)..last.min(total)
    }
}

impl ScrollTarget for PagedRow {
    fn scroll_by(&mut self, dx: f64, behavior: ScrollBehavior) {
        self.scroll_left = (self.scroll_left + dx).clamp(0.0, self.max_scroll());
        self.last_behavior = Some(behavior);
    }
}
