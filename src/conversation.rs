//! Conversation state machine and per-chat sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use crate::intents::{Intent, IntentDetectors, FAREWELL, GREETING};
use crate::matcher::Matcher;
use crate::services::{Sentiment, SentimentClassifier};

pub const NOT_UNDERSTOOD: &str = "Я что-то тебя не понимаю...";
pub const ANYTHING_ELSE: &str = "Могу ещё чем-нибудь помочь?";
pub const SOMETHING_ELSE: &str = "Поискать что-нибудь ещё?";
pub const SUGGESTIONS_HEADER: &str = "Вот что я нашёл:";
pub const HELP: &str = "Я умею здороваться и прощаться, рассказывать прогноз погоды \
и факты про кошек, а ещё подбирать пиво по описанию. Просто напиши, что ищешь.\n\
/start - начать сначала\n/end - закончить разговор";
const REPROACHES: &[&str] = &[
    "Давай без грубостей, пожалуйста.",
    "Не надо так. Я всего лишь бот, который любит пиво.",
];

pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Main,
    Product,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub image: String,
    pub caption: String,
}

/// One outgoing item, in the order the transport should deliver them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Reply {
    Text(String),
    Media(Media),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text.as_str()),
            Reply::Media(_) => None,
        }
    }
}

/// Result of one routing step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub replies: Vec<Reply>,
    pub next: State,
}

impl Turn {
    fn single(text: &str, next: State) -> Self {
        Self {
            replies: vec![Reply::text(text)],
            next,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    End,
}

impl Command {
    fn parse(message: &str) -> Option<Command> {
        let word = message.split_whitespace().next()?;
        // "/start@pivo_bot" style suffixes name the addressed bot
        let name = word.strip_prefix('/')?.split('@').next()?;
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "end" => Some(Command::End),
            _ => None,
        }
    }
}

pub struct Router {
    detectors: IntentDetectors,
    matcher: Arc<Matcher>,
    sentiment: Option<Arc<dyn SentimentClassifier>>,
    sentiment_timeout: Duration,
    suggestions: usize,
}

impl Router {
    pub fn new(detectors: IntentDetectors, matcher: Arc<Matcher>) -> Self {
        Self {
            detectors,
            matcher,
            sentiment: None,
            sentiment_timeout: Duration::from_secs(5),
            suggestions: Matcher::DEFAULT_K,
        }
    }

    /// Answers rude messages with a reproach instead of routing them.
    pub fn with_sentiment(mut self, classifier: Arc<dyn SentimentClassifier>, timeout: Duration) -> Self {
        self.sentiment = Some(classifier);
        self.sentiment_timeout = timeout;
        self
    }

    pub fn with_suggestions(mut self, k: usize) -> Self {
        self.suggestions = k;
        self
    }

    /// Decides the replies to `message` and the state the conversation moves to.
    pub async fn step(&self, state: State, message: &str) -> Turn {
        if let Some(command) = Command::parse(message) {
            return self.command(command, state);
        }
        match state {
            State::Ended => {
                log::error!("Message routed to an ended conversation, restarting it");
                Turn::single(NOT_UNDERSTOOD, State::Main)
            }
            State::Main | State::Product => {
                if self.is_negative(message).await {
                    let reproach = REPROACHES
                        .choose(&mut rand::thread_rng())
                        .copied()
                        .unwrap_or(NOT_UNDERSTOOD);
                    return Turn::single(reproach, state);
                }
                if state == State::Product {
                    self.product(message)
                } else {
                    self.main(message).await
                }
            }
        }
    }

    fn command(&self, command: Command, state: State) -> Turn {
        match command {
            Command::Start => Turn::single(GREETING, State::Main),
            Command::Help => Turn::single(HELP, state),
            Command::End => Turn::single(FAREWELL, State::Ended),
        }
    }

    async fn main(&self, message: &str) -> Turn {
        let triggered = self.detectors.triggered(message);
        let farewell = triggered.contains(&Intent::Farewell);
        let product = triggered.contains(&Intent::Product);

        if triggered.is_empty() || (farewell && product) {
            return Turn::single(NOT_UNDERSTOOD, State::Main);
        }

        let mut replies = Vec::with_capacity(triggered.len() + 1);
        for &intent in &triggered {
            replies.push(Reply::Text(self.detectors.respond(intent, message).await));
        }
        replies.push(Reply::text(ANYTHING_ELSE));

        let next = if farewell {
            State::Ended
        } else if product {
            State::Product
        } else {
            State::Main
        };
        Turn { replies, next }
    }

    fn product(&self, message: &str) -> Turn {
        let suggestions = self.matcher.suggest(message, self.suggestions);

        let mut listing = String::from(SUGGESTIONS_HEADER);
        for (i, suggestion) in suggestions.iter().enumerate() {
            listing.push_str(&format!("\n{}. {}", i + 1, suggestion.name));
        }

        let mut replies = Vec::with_capacity(suggestions.len() + 2);
        replies.push(Reply::Text(listing));
        replies.extend(suggestions.into_iter().map(|s| {
            Reply::Media(Media {
                image: s.image,
                caption: s.name,
            })
        }));
        replies.push(Reply::text(SOMETHING_ELSE));
        Turn {
            replies,
            next: State::Main,
        }
    }

    async fn is_negative(&self, message: &str) -> bool {
        let Some(classifier) = &self.sentiment else {
            return false;
        };
        match tokio::time::timeout(self.sentiment_timeout, classifier.classify(message)).await {
            Ok(Ok(label)) => label == Sentiment::Negative,
            Ok(Err(e)) => {
                log::warn!("Sentiment classifier unavailable: {}", e);
                false
            }
            Err(_) => {
                log::warn!("Sentiment classifier timed out");
                false
            }
        }
    }
}

/// Conversation state of one chat.
#[derive(Debug)]
struct Session {
    state: State,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            state: State::Main,
            last_active: Instant::now(),
        }
    }
}

type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Sessions keyed by chat; each one is locked for the duration of a turn.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ChatId, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, chat_id: ChatId) -> SessionHandle {
        self.sessions
            .lock()
            .entry(chat_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Session::new())))
            .clone()
    }

    /// Locks the chat's session, making sure the store still holds it once the lock is ours.
    async fn lock(&self, chat_id: ChatId) -> (SessionHandle, OwnedMutexGuard<Session>) {
        loop {
            let handle = self.entry(chat_id);
            let session = Arc::clone(&handle).lock_owned().await;
            if self.holds(chat_id, &handle) {
                return (handle, session);
            }
            // ended or pruned while we waited
            log::debug!("chat {}: session replaced while waiting, retrying", chat_id);
        }
    }

    fn holds(&self, chat_id: ChatId, handle: &SessionHandle) -> bool {
        self.sessions
            .lock()
            .get(&chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    fn remove(&self, chat_id: ChatId, handle: &SessionHandle) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(&chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(&chat_id);
        }
    }

    /// Current state of a chat, if it has a live session that is not mid-turn.
    pub fn state(&self, chat_id: ChatId) -> Option<State> {
        let handle = self.sessions.lock().get(&chat_id)?.clone();
        let session = handle.try_lock().ok()?;
        Some(session.state)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drops sessions idle for at least `ttl`. Sessions in the middle of a turn are kept.
    pub fn prune_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.last_active.elapsed() < ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

/// Routes incoming messages through their chat's session.
pub struct Conversations {
    router: Router,
    sessions: SessionStore,
}

impl Conversations {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, chat_id: ChatId, text: &str) -> Turn {
        // sessions leave the store when they end, so a held one is never ENDED
        let (handle, mut session) = self.sessions.lock(chat_id).await;
        let turn = self.router.step(session.state, text).await;
        log::info!("chat {}: {:?} -> {:?}", chat_id, session.state, turn.next);
        session.state = turn.next;
        session.last_active = Instant::now();

        if turn.next == State::Ended {
            self.sessions.remove(chat_id, &handle);
        }
        turn
    }
}
