//! Asynchronous notifications about processed games.
//!
//! The engine sends a [`GameNotification`] after it has released the game
//! lock. The channel is unbounded, so sending never blocks. Consumers
//! either take the receiver and poll it from async code, or register a
//! handler that runs on its own thread. Until one of them claims the
//! receiver, notifications are dropped rather than buffered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::core::{GameId, PlayerId};
use crate::events::Event;

/// What a notification reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    GameCreated,
    ActionProcessed,
    /// The action was rejected; `events` is empty.
    ActionFailed,
    /// A bookmark, undo point or turn snapshot was put back.
    StateRestored,
    /// Events published by a direct state edit.
    StateChanged,
    GamePaused,
    GameResumed,
    GameOver,
}

/// One message on the notification channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameNotification {
    pub game_id: GameId,
    pub kind: NotificationKind,
    pub player: Option<PlayerId>,
    pub events: Vec<Event>,
    /// Failure reason for `ActionFailed`.
    pub message: Option<String>,
}

impl GameNotification {
    #[must_use]
    pub fn new(game_id: GameId, kind: NotificationKind) -> Self {
        Self {
            game_id,
            kind,
            player: None,
            events: Vec::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.player = Some(player);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Sending half of the notification channel, plus the receiver until
/// someone claims it.
#[derive(Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<GameNotification>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<GameNotification>>>,
    claimed: AtomicBool,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            claimed: AtomicBool::new(false),
        }
    }

    /// Whether a consumer has taken the receiver.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Queue a notification. Dropped silently while nobody has claimed the
    /// receiver and once the receiver is gone.
    pub fn send(&self, notification: GameNotification) {
        let kind = notification.kind;
        if !self.is_claimed() {
            trace!(?kind, "notification dropped, no consumer");
            return;
        }
        if self.tx.send(notification).is_err() {
            trace!(?kind, "notification dropped, receiver closed");
        }
    }

    /// Claim the receiver. Only the first caller gets it.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<GameNotification>> {
        let rx = self.rx.lock().ok().and_then(|mut rx| rx.take())?;
        self.claimed.store(true, Ordering::Release);
        Some(rx)
    }

    /// Run `handler` for every notification on a dedicated thread.
    ///
    /// Returns `None` if the receiver was already claimed. The thread ends
    /// when the notifier is dropped.
    pub fn spawn_handler(
        &self,
        mut handler: impl FnMut(GameNotification) + Send + 'static,
    ) -> Option<JoinHandle<()>> {
        let mut rx = self.take_receiver()?;
        let handle = std::thread::spawn(move || {
            while let Some(notification) = rx.blocking_recv() {
                handler(notification);
            }
            debug!("notification handler stopped");
        });
        Some(handle)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
