use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ember_backend::Backend;
use ember_gesture::{SwipeConfig, SwipeEngine};
use ember_types::events::ChangeEvent;
use ember_types::{Profile, SwipeDirection};

use crate::activity::ChangeFeed;

/// Length of the overlay's closing transition.
pub const OVERLAY_CLOSE_DELAY: Duration = Duration::from_millis(500);

/// Invoked once the match overlay has finished closing.
pub trait OverlayClose: Send {
    fn on_close(&mut self, profile: &Profile);
}

impl<F> OverlayClose for F
where
    F: FnMut(&Profile) + Send,
{
    fn on_close(&mut self, profile: &Profile) {
        self(profile)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwipeOutcome {
    /// Nothing to swipe.
    Empty,
    Passed(Profile),
    Liked { profile: Profile, matched: bool },
}

impl SwipeOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Liked { matched: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOverlay {
    pub profile: Profile,
    pub closing: bool,
}

/// What the deck area shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeckView<'a> {
    Card(&'a Profile),
    NoMoreProfiles,
}

/// The front card is the only interactive one; a resolved swipe consumes it
/// whatever the direction.
pub struct CardDeck {
    backend: Arc<dyn Backend>,
    user_id: Uuid,
    cards: VecDeque<Profile>,
    overlay: Option<MatchOverlay>,
    feed: Option<ChangeFeed>,
    close_delay: Duration,
}

impl CardDeck {
    pub fn new(backend: Arc<dyn Backend>, user_id: Uuid, profiles: Vec<Profile>) -> Self {
        Self {
            backend,
            user_id,
            cards: profiles.into(),
            overlay: None,
            feed: None,
            close_delay: OVERLAY_CLOSE_DELAY,
        }
    }

    /// Publishes a `ConnectionCreated` event for every match.
    pub fn with_change_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn top(&self) -> Option<&Profile> {
        self.cards.front()
    }

    pub fn view(&self) -> DeckView<'_> {
        match self.cards.front() {
            Some(profile) => DeckView::Card(profile),
            None => DeckView::NoMoreProfiles,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.cards.iter()
    }

    pub fn match_overlay(&self) -> Option<&MatchOverlay> {
        self.overlay.as_ref()
    }

    /// Consumes the top card and records the decision.
    pub async fn swipe(&mut self, direction: SwipeDirection) -> SwipeOutcome {
        let Some(profile) = self.cards.pop_front() else {
            return SwipeOutcome::Empty;
        };
        debug!(profile = %profile.id, %direction, remaining = self.cards.len(), "card swiped");

        let matched = match self
            .backend
            .record_swipe(self.user_id, profile.id, direction)
            .await
        {
            Ok(resp) => resp.matched,
            Err(e) => {
                warn!(profile = %profile.id, "recording swipe failed: {}", e);
                false
            }
        };

        if matched {
            info!(profile = %profile.id, "it's a match");
            if let Some(feed) = &self.feed {
                feed.publish(ChangeEvent::ConnectionCreated {
                    recipient_id: self.user_id,
                    counterpart_id: profile.id,
                });
            }
            self.overlay = Some(MatchOverlay {
                profile: profile.clone(),
                closing: false,
            });
        }

        match direction {
            SwipeDirection::Left => SwipeOutcome::Passed(profile),
            SwipeDirection::Right => SwipeOutcome::Liked { profile, matched },
        }
    }

    /// Runs the closing transition, then hands the matched profile to
    /// `on_close`. Returns `false` if no overlay was open.
    pub async fn dismiss_match(&mut self, mut on_close: impl OverlayClose) -> bool {
        match self.overlay.as_mut() {
            Some(overlay) if !overlay.closing => overlay.closing = true,
            _ => return false,
        }

        tokio::time::sleep(self.close_delay).await;

        match self.overlay.take() {
            Some(overlay) => {
                on_close.on_close(&overlay.profile);
                true
            }
            None => false,
        }
    }
}

/// Binds a swipe engine to a deck. Resolved gestures are queued and applied
/// by [`DeckController::process`]; the engine ignores drags once the deck is
/// empty.
pub struct DeckController {
    deck: CardDeck,
    engine: SwipeEngine,
    rx: mpsc::UnboundedReceiver<SwipeDirection>,
}

impl DeckController {
    pub fn new(deck: CardDeck, config: SwipeConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = SwipeEngine::new(config).with_handler(move |direction: SwipeDirection| {
            let _ = tx.send(direction);
        });
        engine.set_enabled(!deck.is_empty());
        Self { deck, engine, rx }
    }

    pub fn deck(&self) -> &CardDeck {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut CardDeck {
        &mut self.deck
    }

    pub fn gestures(&mut self) -> &mut SwipeEngine {
        &mut self.engine
    }

    pub fn gesture_state(&self) -> &SwipeEngine {
        &self.engine
    }

    /// Applies every swipe resolved since the last call.
    pub async fn process(&mut self) -> Vec<SwipeOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(direction) = self.rx.try_recv() {
            outcomes.push(self.deck.swipe(direction).await);
        }
        self.engine.set_enabled(!self.deck.is_empty());
        outcomes
    }
}
