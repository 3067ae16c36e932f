use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ember_types::SwipeDirection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::scroll::{ScrollBehavior, ScrollTarget};

/// Default distance in px a drag must exceed to count as a swipe.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Default window during which a resolved direction stays visible.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Default scroll distance requested from a bound scroll target.
pub const DEFAULT_SCROLL_STEP: f64 = 200.0;

/// Tuning knobs. The card deck and the paged rows share the engine with
/// different visual amplitudes, so none of these are fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeConfig {
    pub threshold: f64,
    pub settle: Duration,
    pub scroll_step: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            settle: DEFAULT_SETTLE,
            scroll_step: DEFAULT_SCROLL_STEP,
        }
    }
}

/// Receives resolved swipe directions. Business effects (advancing a deck,
/// paging a list, recording a decision) live here, never in the engine.
pub trait SwipeHandler: Send {
    fn on_swipe(&mut self, direction: SwipeDirection);
}

impl<F> SwipeHandler for F
where
    F: FnMut(SwipeDirection) + Send,
{
    fn on_swipe(&mut self, direction: SwipeDirection) {
        self(direction)
    }
}

/// Live state of the current gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwipeSession {
    pub dragging: bool,
    pub start_x: f64,
    pub offset_x: f64,
    pub direction: Option<SwipeDirection>,
    /// Bumped on every resolved swipe; a settle timer only clears the
    /// session if no newer swipe happened in between.
    generation: u64,
}

pub struct SwipeEngine {
    config: SwipeConfig,
    session: Arc<Mutex<SwipeSession>>,
    handler: Option<Box<dyn SwipeHandler>>,
    scroll: Option<Box<dyn ScrollTarget>>,
    enabled: bool,
    shutdown: CancellationToken,
}

impl SwipeEngine {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(SwipeSession::default())),
            handler: None,
            scroll: None,
            enabled: true,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_handler(mut self, handler: impl SwipeHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn with_scroll_target(mut self, target: impl ScrollTarget + 'static) -> Self {
        self.scroll = Some(Box::new(target));
        self
    }

    pub fn config(&self) -> &SwipeConfig {
        &self.config
    }

    /// Disabled engines ignore drag input. Programmatic swipes still go through.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            let mut session = self.lock();
            session.dragging = false;
            session.offset_x = 0.0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot of the current gesture state for rendering.
    pub fn session(&self) -> SwipeSession {
        self.lock().clone()
    }

    pub fn offset_x(&self) -> f64 {
        self.lock().offset_x
    }

    pub fn direction(&self) -> Option<SwipeDirection> {
        self.lock().direction
    }

    pub fn is_dragging(&self) -> bool {
        self.lock().dragging
    }

    pub fn on_drag_start(&mut self, x: f64) {
        if !self.enabled {
            return;
        }
        let mut session = self.lock();
        session.dragging = true;
        session.start_x = x;
        session.offset_x = 0.0;
        trace!(x, "drag start");
    }

    pub fn on_drag_move(&mut self, x: f64) {
        let mut session = self.lock();
        if !session.dragging {
            return;
        }
        session.offset_x = x - session.start_x;
    }

    /// Ends the gesture. Returns the resolved direction, or `None` when the
    /// drag stayed within the threshold (a tap) or no drag was active.
    pub fn on_drag_end(&mut self) -> Option<SwipeDirection> {
        let resolved = {
            let mut session = self.lock();
            if !session.dragging {
                return None;
            }
            session.dragging = false;

            if session.offset_x.abs() > self.config.threshold {
                let direction = if session.offset_x > 0.0 {
                    SwipeDirection::Right
                } else {
                    SwipeDirection::Left
                };
                session.direction = Some(direction);
                session.generation += 1;
                Some((direction, session.generation))
            } else {
                session.offset_x = 0.0;
                None
            }
        };

        let (direction, generation) = resolved?;
        debug!(%direction, "swipe resolved");
        self.dispatch(direction);
        self.arm_settle(generation);
        Some(direction)
    }

    /// Swipe from an explicit prev/next control. Skips the threshold.
    pub fn swipe_programmatically(&mut self, direction: SwipeDirection) {
        let generation = {
            let mut session = self.lock();
            session.direction = Some(direction);
            session.generation += 1;
            session.generation
        };
        debug!(%direction, "programmatic swipe");
        self.dispatch(direction);
        self.arm_settle(generation);
    }

    /// Cancels pending settle timers. Also happens on drop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn dispatch(&mut self, direction: SwipeDirection) {
        if let Some(handler) = self.handler.as_mut() {
            handler.on_swipe(direction);
        }
        if let Some(scroll) = self.scroll.as_mut() {
            // Right swipe reveals what is to the left.
            let dx = match direction {
                SwipeDirection::Right => -self.config.scroll_step,
                SwipeDirection::Left => self.config.scroll_step,
            };
            scroll.scroll_by(dx, ScrollBehavior::Smooth);
        }
    }

    fn arm_settle(&self, generation: u64) {
        let session = Arc::clone(&self.session);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // No runtime to time the transition; settle right away.
            settle(&session, generation);
            return;
        };

        let token = self.shutdown.child_token();
        let delay = self.config.settle;
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => settle(&session, generation),
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, SwipeSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SwipeEngine {
    fn default() -> Self {
        Self::new(SwipeConfig::default())
    }
}

impl Drop for SwipeEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn settle(session: &Mutex<SwipeSession>, generation: u64) {
    let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
    if session.generation != generation {
        return;
    }
    session.direction = None;
    if !session.dragging {
        session.offset_x = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::PagedRow;

    fn recording_engine(config: SwipeConfig) -> (SwipeEngine, Arc<Mutex<Vec<SwipeDirection>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let engine = SwipeEngine::new(config)
            .with_handler(move |d: SwipeDirection| sink.lock().unwrap().push(d));
        (engine, seen)
    }

    fn drag(engine: &mut SwipeEngine, from: f64, to: f64) -> Option<SwipeDirection> {
        engine.on_drag_start(from);
        engine.on_drag_move((from + to) / 2.0);
        engine.on_drag_move(to);
        engine.on_drag_end()
    }

    #[tokio::test(start_paused = true)]
    async fn short_drags_are_taps() {
        let (mut engine, seen) = recording_engine(SwipeConfig::default());

        for end in [100.0, 150.0, 50.0, 120.0, 80.0] {
            assert_eq!(drag(&mut engine, 100.0, end), None);
            assert_eq!(engine.offset_x(), 0.0);
            assert_eq!(engine.direction(), None);
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn long_drags_resolve_by_sign() {
        let (mut engine, seen) = recording_engine(SwipeConfig::default());

        assert_eq!(drag(&mut engine, 100.0, 151.0), Some(SwipeDirection::Right));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(drag(&mut engine, 100.0, 49.0), Some(SwipeDirection::Left));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SwipeDirection::Right, SwipeDirection::Left]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn direction_clears_after_settle_window() {
        let (mut engine, _seen) = recording_engine(SwipeConfig::default());

        drag(&mut engine, 0.0, 120.0);
        assert_eq!(engine.direction(), Some(SwipeDirection::Right));
        assert_eq!(engine.offset_x(), 120.0);

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(engine.direction(), Some(SwipeDirection::Right));

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(engine.direction(), None);
        assert_eq!(engine.offset_x(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_swipe_outlives_older_timer() {
        let (mut engine, _seen) = recording_engine(SwipeConfig::default());

        engine.swipe_programmatically(SwipeDirection::Left);
        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.swipe_programmatically(SwipeDirection::Right);

        // First timer fires at 300ms but must not clear the second swipe.
        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(engine.direction(), Some(SwipeDirection::Right));

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(engine.direction(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_is_configurable() {
        let (mut engine, seen) = recording_engine(SwipeConfig {
            threshold: 120.0,
            ..Default::default()
        });

        assert_eq!(drag(&mut engine, 0.0, 100.0), None);
        assert_eq!(drag(&mut engine, 0.0, -121.0), Some(SwipeDirection::Left));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn moves_and_ends_without_start_are_ignored() {
        let (mut engine, seen) = recording_engine(SwipeConfig::default());

        engine.on_drag_move(500.0);
        assert_eq!(engine.offset_x(), 0.0);
        assert_eq!(engine.on_drag_end(), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn programmatic_swipe_scrolls_bound_row() {
        let row = Arc::new(Mutex::new(PagedRow::new(1000.0, 300.0)));
        row.lock().unwrap().scroll_to(400.0);

        let mut engine = SwipeEngine::default().with_scroll_target(Arc::clone(&row));

        engine.swipe_programmatically(SwipeDirection::Left);
        assert_eq!(row.lock().unwrap().scroll_left(), 600.0);

        engine.swipe_programmatically(SwipeDirection::Right);
        engine.swipe_programmatically(SwipeDirection::Right);
        assert_eq!(row.lock().unwrap().scroll_left(), 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_engine_ignores_drags() {
        let (mut engine, seen) = recording_engine(SwipeConfig::default());
        engine.set_enabled(false);

        assert_eq!(drag(&mut engine, 0.0, 400.0), None);
        assert!(!engine.is_dragging());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn settles_immediately_without_runtime() {
        let mut engine = SwipeEngine::default();
        engine.swipe_programmatically(SwipeDirection::Right);
        assert_eq!(engine.direction(), None);
    }
}
