use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use ember_backend::{Backend, fallback};
use ember_client::deck::MatchOverlay;
use ember_client::{
    ActivityTracker, CardDeck, ChangeFeed, ChatEngine, DeckController, DeckView,
    NotificationCenter, PhotoManager, ProfileStore, ProfileUpdate, Scope, SwipeOutcome,
    load_connections,
};
use ember_client::connections::apply_activity;
use ember_gesture::{PagedRow, SwipeConfig, SwipeEngine};
use ember_types::{Connection, PhotoUpload, Profile, SwipeDirection};

const COUNTRY_BUTTON_WIDTH: f64 = 120.0;
const COUNTRY_VIEWPORT_WIDTH: f64 = 360.0;

pub const HELP: &str = "\
commands:
  deck                     show the top card
  swipe left|right         pass or like the top card
  drag <x0> <x1>           drag the top card from x0 to x1
  dismiss                  close the match overlay
  matches                  list connections
  chat <name>              open a conversation
  say <text>               send a message in the open conversation
  close                    close the conversation
  photos                   list your photos
  move <from> <to>         reorder a photo
  delete <index>           delete a photo
  upload <path>            add a photo from a file
  bio <text>               update your bio
  countries left|right     page the country selector
  toasts                   show notifications
  clear                    clear notifications
  help                     show this text
  quit                     exit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Deck,
    Swipe(SwipeDirection),
    Drag(f64, f64),
    Dismiss,
    Matches,
    Chat(String),
    Say(String),
    Close,
    Photos,
    Move(usize, usize),
    Delete(usize),
    Upload(PathBuf),
    Bio(String),
    Countries(SwipeDirection),
    Toasts,
    Clear,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let cmd = match word {
            "deck" => Self::Deck,
            "swipe" => Self::Swipe(direction(&args, "swipe left|right")?),
            "drag" => match args.as_slice() {
                [x0, x1] => Self::Drag(
                    x0.parse().map_err(|_| CommandError::Usage("drag <x0> <x1>"))?,
                    x1.parse().map_err(|_| CommandError::Usage("drag <x0> <x1>"))?,
                ),
                _ => return Err(CommandError::Usage("drag <x0> <x1>")),
            },
            "dismiss" => Self::Dismiss,
            "matches" => Self::Matches,
            "chat" if !rest.is_empty() => Self::Chat(rest.to_string()),
            "chat" => return Err(CommandError::Usage("chat <name>")),
            // Empty text is allowed through; the chat engine rejects it.
            "say" => Self::Say(rest.to_string()),
            "close" => Self::Close,
            "photos" => Self::Photos,
            "move" => match args.as_slice() {
                [from, to] => Self::Move(
                    from.parse().map_err(|_| CommandError::Usage("move <from> <to>"))?,
                    to.parse().map_err(|_| CommandError::Usage("move <from> <to>"))?,
                ),
                _ => return Err(CommandError::Usage("move <from> <to>")),
            },
            "delete" => match args.as_slice() {
                [index] => Self::Delete(
                    index.parse().map_err(|_| CommandError::Usage("delete <index>"))?,
                ),
                _ => return Err(CommandError::Usage("delete <index>")),
            },
            "upload" if !rest.is_empty() => Self::Upload(PathBuf::from(rest)),
            "upload" => return Err(CommandError::Usage("upload <path>")),
            "bio" => Self::Bio(rest.to_string()),
            "countries" => Self::Countries(direction(&args, "countries left|right")?),
            "toasts" => Self::Toasts,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

fn direction(args: &[&str], usage: &'static str) -> Result<SwipeDirection, CommandError> {
    match args {
        [dir] => dir.parse().map_err(|_| CommandError::Usage(usage)),
        _ => Err(CommandError::Usage(usage)),
    }
}

pub enum Step {
    Continue(String),
    Quit,
}

/// Everything one signed-in session needs, wired together.
pub struct App {
    user_id: Uuid,
    backend: Arc<dyn Backend>,
    notifications: NotificationCenter,
    profile: ProfileStore,
    deck: DeckController,
    photos: PhotoManager,
    chat: Option<(String, ChatEngine)>,
    connections: Vec<Connection>,
    countries: Vec<String>,
    country_row: Arc<Mutex<PagedRow>>,
    country_engine: SwipeEngine,
    shutdown: CancellationToken,
    tracker: JoinHandle<()>,
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifications: NotificationCenter,
        user_id: Uuid,
        swipe: SwipeConfig,
    ) -> Self {
        let feed = ChangeFeed::new();
        let shutdown = CancellationToken::new();
        let tracker = ActivityTracker::new(user_id, notifications.clone())
            .spawn(feed.subscribe(), shutdown.child_token());

        let me = own_profile(user_id);
        let profile = ProfileStore::new(me.clone());
        let photos = PhotoManager::new(
            Arc::clone(&backend),
            notifications.clone(),
            user_id,
            me.photos.clone(),
        )
        .with_profile_store(profile.clone());

        let cards = CardDeck::new(Arc::clone(&backend), user_id, fallback::sample_profiles())
            .with_change_feed(feed);
        let deck = DeckController::new(cards, swipe);

        let mut countries: Vec<String> = fallback::sample_profiles()
            .into_iter()
            .map(|p| p.country)
            .filter(|c| !c.is_empty())
            .collect();
        countries.sort();
        countries.dedup();
        let country_row = Arc::new(Mutex::new(PagedRow::for_items(
            countries.len(),
            COUNTRY_BUTTON_WIDTH,
            COUNTRY_VIEWPORT_WIDTH,
        )));
        let country_engine = SwipeEngine::new(swipe).with_scroll_target(Arc::clone(&country_row));

        Self {
            user_id,
            backend,
            notifications,
            profile,
            deck,
            photos,
            chat: None,
            connections: Vec::new(),
            countries,
            country_row,
            country_engine,
            shutdown,
            tracker,
        }
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub async fn handle(&mut self, line: &str) -> Step {
        if line.trim().is_empty() {
            return Step::Continue(String::new());
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => Step::Quit,
            Ok(cmd) => Step::Continue(self.execute(cmd).await),
            Err(e) => Step::Continue(e.to_string()),
        }
    }

    pub async fn execute(&mut self, cmd: Command) -> String {
        debug!(?cmd, "command");
        match cmd {
            Command::Deck => self.render_deck(),
            Command::Swipe(direction) => {
                self.deck.gestures().swipe_programmatically(direction);
                self.apply_swipes().await
            }
            Command::Drag(x0, x1) => {
                let gestures = self.deck.gestures();
                gestures.on_drag_start(x0);
                gestures.on_drag_move(x1);
                match gestures.on_drag_end() {
                    Some(_) => self.apply_swipes().await,
                    None if self.deck.deck().is_empty() => "No more profiles.".into(),
                    None => format!("Card snapped back.\n{}", self.render_deck()),
                }
            }
            Command::Dismiss => {
                let mut closed = None;
                let dismissed = self
                    .deck
                    .deck_mut()
                    .dismiss_match(|p: &Profile| closed = Some(p.name.clone()))
                    .await;
                match closed {
                    Some(name) if dismissed => {
                        format!("Say hi to {name} with 'chat {name}'.")
                    }
                    _ => "No match to dismiss.".into(),
                }
            }
            Command::Matches => {
                self.refresh_connections().await;
                self.render_connections()
            }
            Command::Chat(name) => self.open_chat(&name).await,
            Command::Say(text) => {
                let Some((name, chat)) = &self.chat else {
                    return "No conversation open.".into();
                };
                chat.set_draft(text);
                match chat.send().await {
                    Ok(msg) => format!("you -> {name}: {}", msg.content),
                    Err(e) => format!("Not sent: {e}"),
                }
            }
            Command::Close => match self.chat.take() {
                Some((name, chat)) => {
                    chat.close();
                    format!("Closed conversation with {name}.")
                }
                None => "No conversation open.".into(),
            },
            Command::Photos => self.render_photos(),
            Command::Move(from, to) => {
                if !self.photos.begin_drag(from) {
                    return format!("No photo at {from}.");
                }
                self.photos.drag_over(to);
                match self.photos.end_drag().await {
                    Ok(_) => self.render_photos(),
                    Err(e) => format!("Order not saved: {e}"),
                }
            }
            Command::Delete(index) => match self.photos.delete(index).await {
                Ok(true) => self.render_photos(),
                Ok(false) => format!("No photo at {index}."),
                Err(e) => format!("Not deleted: {e}"),
            },
            Command::Upload(path) => match read_upload(&path).await {
                Ok(upload) => match self.photos.add(upload).await {
                    Ok(photo) => format!("Added photo {} at {}.", photo.id, photo.position),
                    Err(e) => format!("Not added: {e}"),
                },
                Err(e) => format!("Could not read {}: {e}", path.display()),
            },
            Command::Bio(text) => match self.profile.save_profile(ProfileUpdate {
                bio: Some(text),
                ..Default::default()
            }) {
                Ok(p) => format!("Bio saved: {}", p.bio),
                Err(e) => format!("Not saved: {e}"),
            },
            Command::Countries(direction) => {
                self.country_engine.swipe_programmatically(direction);
                self.render_countries()
            }
            Command::Toasts => self.render_toasts(),
            Command::Clear => {
                self.notifications.clear(Scope::All);
                apply_activity(&mut self.connections, &self.notifications);
                "Notifications cleared.".into()
            }
            Command::Help => HELP.into(),
            Command::Quit => String::new(),
        }
    }

    async fn apply_swipes(&mut self) -> String {
        let outcomes = self.deck.process().await;
        let mut out = String::new();
        for outcome in outcomes {
            match outcome {
                SwipeOutcome::Empty => {}
                SwipeOutcome::Passed(p) => {
                    let _ = writeln!(out, "Passed on {}.", p.name);
                }
                SwipeOutcome::Liked { profile, matched } => {
                    let _ = writeln!(out, "Liked {}.", profile.name);
                    if matched {
                        let _ = writeln!(out, "It's a match with {}! ('dismiss' to continue)", profile.name);
                    }
                }
            }
        }
        out.push_str(&self.render_deck());
        out
    }

    async fn refresh_connections(&mut self) {
        self.connections =
            load_connections(self.backend.as_ref(), self.user_id, &self.notifications).await;
    }

    async fn open_chat(&mut self, name: &str) -> String {
        if let Some((open, chat)) = &self.chat {
            if open.eq_ignore_ascii_case(name) {
                return render_messages(open, &chat.messages());
            }
        }
        if !self.connections.iter().any(|c| c.profile.name.eq_ignore_ascii_case(name)) {
            self.refresh_connections().await;
        }
        let Some(connection) = self
            .connections
            .iter()
            .find(|c| c.profile.name.eq_ignore_ascii_case(name))
        else {
            return format!("No connection named {name}.");
        };

        let recipient = connection.profile.id;
        let display = connection.profile.name.clone();
        if let Some((_, previous)) = self.chat.take() {
            previous.close();
        }

        let chat = ChatEngine::new(
            Arc::clone(&self.backend),
            self.notifications.clone(),
            self.user_id,
            recipient,
        );
        chat.open().await;
        apply_activity(&mut self.connections, &self.notifications);
        info!(%recipient, "chat opened");

        let out = render_messages(&display, &chat.messages());
        self.chat = Some((display, chat));
        out
    }

    fn render_deck(&self) -> String {
        let mut out = match self.deck.deck().view() {
            DeckView::Card(p) => {
                let mut card = format!("{}, {} ({}, {})", p.name, p.age, p.location, p.country);
                if !p.bio.is_empty() {
                    let _ = write!(card, "\n  {}", p.bio);
                }
                if !p.interests.is_empty() {
                    let _ = write!(card, "\n  likes: {}", p.interests.join(", "));
                }
                let _ = write!(card, "\n  {} more after this", self.deck.deck().len() - 1);
                card
            }
            DeckView::NoMoreProfiles => "No more profiles.".into(),
        };
        if let Some(MatchOverlay { profile, .. }) = self.deck.deck().match_overlay() {
            let _ = write!(out, "\n[match with {} open]", profile.name);
        }
        out
    }

    fn render_connections(&self) -> String {
        if self.connections.is_empty() {
            return "No connections yet.".into();
        }
        let mut out = String::new();
        for c in &self.connections {
            let mut marks = String::new();
            if c.is_new_match {
                marks.push_str(" [new]");
            }
            if c.has_new_message {
                marks.push_str(" [unread]");
            }
            let _ = writeln!(out, "{}, {}{}", c.profile.name, c.profile.age, marks);
        }
        out.truncate(out.trim_end().len());
        out
    }

    fn render_photos(&self) -> String {
        let photos = self.photos.photos();
        let mut out = String::new();
        for (i, p) in photos.iter().enumerate() {
            let _ = writeln!(out, "{i}: {}", p.url);
        }
        out.truncate(out.trim_end().len());
        out
    }

    fn render_countries(&self) -> String {
        let row = self.country_row.lock().unwrap_or_else(PoisonError::into_inner);
        let visible = row.visible_range(COUNTRY_BUTTON_WIDTH);
        let shown: Vec<&str> = self
            .countries
            .get(visible)
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();
        format!(
            "{}{}{}",
            if row.can_scroll_left() { "< " } else { "  " },
            shown.join(" | "),
            if row.can_scroll_right() { " >" } else { "" },
        )
    }

    fn render_toasts(&self) -> String {
        let toasts = self.notifications.toasts();
        if toasts.is_empty() {
            return "No notifications.".into();
        }
        toasts
            .iter()
            .map(|t| format!("[{:?}] {}", t.kind, t.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Stops background work. Pending timers and the activity tracker are
    /// cancelled.
    pub async fn shutdown(self) {
        if let Some((_, chat)) = &self.chat {
            chat.close();
        }
        self.shutdown.cancel();
        self.country_engine.shutdown();
        self.deck.gesture_state().shutdown();
        let _ = self.tracker.await;
    }
}

fn render_messages(name: &str, messages: &[ember_types::ChatMessage]) -> String {
    let mut out = format!("Conversation with {name}");
    for m in messages {
        let who = if m.is_from_current_user { "you" } else { name };
        let _ = write!(out, "\n  {} {}: {}", m.timestamp.format("%H:%M"), who, m.content);
        if m.is_provisional() {
            out.push_str(" (sending)");
        }
    }
    out
}

fn own_profile(user_id: Uuid) -> Profile {
    Profile {
        id: user_id,
        name: "You".into(),
        age: 30,
        bio: String::new(),
        location: "Lisbon".into(),
        country: "Portugal".into(),
        interests: vec!["travel".into()],
        photos: fallback::sample_photos("me", 3),
    }
}

async fn read_upload(path: &Path) -> std::io::Result<PhotoUpload> {
    let bytes = tokio::fs::read(path).await?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo")
        .to_string();
    Ok(PhotoUpload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}
