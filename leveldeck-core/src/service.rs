use crate::{CoreError, Deck, Dictionary, Key, Presenter, Progress};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One request of the command protocol, `{"cmd": ..., "arg": ...}` on the wire.
/// `arg` is ignored by the commands that take none.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawRequest")]
pub enum Request {
    Draw,
    Progress,
    Answer(bool),
    Delete,
    Add(String),
}

#[derive(Deserialize)]
struct RawRequest {
    cmd: String,
    #[serde(default)]
    arg: Value,
}

impl TryFrom<RawRequest> for Request {
    type Error = &'static str;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        match raw.cmd.as_str() {
            "draw" => Ok(Request::Draw),
            "progress" => Ok(Request::Progress),
            "delete" => Ok(Request::Delete),
            "answer" => raw.arg.as_bool().map(Request::Answer).ok_or("answer needs a boolean arg"),
            "add" => match raw.arg {
                Value::String(key) => Ok(Request::Add(key)),
                _ => Err("add needs a string arg"),
            },
            _ => Err("unknown command"),
        }
    }
}

impl Request {
    pub fn from_json(body: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(body).map_err(|_| CoreError::Invalid("unknown command or malformed request"))
    }
}

/// `{"key": ..., "value": ...}` reply envelope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reply {
    pub key: Option<String>,
    pub value: Value,
}

impl Reply {
    fn empty() -> Self {
        Self { key: None, value: Value::Null }
    }
}

struct Session {
    deck: Deck,
    current: Option<Key>,
}

/// Serializes access to a `Deck` for request handlers and pairs drawn keys with
/// dictionary content. At most one drawn key is outstanding; `answer` and `delete`
/// act on it.
pub struct DeckService {
    session: Mutex<Session>,
    dictionary: Arc<dyn Dictionary>,
    presenter: Presenter,
}

impl DeckService {
    pub fn new(deck: Deck, dictionary: Arc<dyn Dictionary>, presenter: Presenter) -> Self {
        Self {
            session: Mutex::new(Session { deck, current: None }),
            dictionary,
            presenter,
        }
    }

    pub async fn handle(&self, request: Request) -> Result<Reply, CoreError> {
        match request {
            Request::Draw => self.draw().await,
            Request::Progress => {
                let p = self.progress().await;
                Ok(Reply {
                    key: Some("progress".into()),
                    value: serde_json::to_value(p).map_err(|_| CoreError::Invalid("progress"))?,
                })
            }
            Request::Answer(correct) => {
                self.answer(correct).await?;
                Ok(Reply::empty())
            }
            Request::Delete => {
                self.delete().await?;
                Ok(Reply::empty())
            }
            Request::Add(key) => {
                let added = self.add(&key).await?;
                Ok(Reply {
                    key: Some("valid".into()),
                    value: Value::Bool(added),
                })
            }
        }
    }

    /// Draws a key and looks up its content. `key` is null when nothing is left.
    pub async fn draw(&self) -> Result<Reply, CoreError> {
        let mut s = self.session.lock().await;
        if s.current.is_some() {
            return Err(CoreError::DrawPending);
        }
        let Some(key) = s.deck.draw()? else {
            return Ok(Reply::empty());
        };
        s.current = Some(key.clone());
        drop(s);

        let value = match self.dictionary.lookup(&key).await {
            Ok(v) => Value::String((self.presenter.format_value)(&v)),
            Err(e) => {
                warn!("no content for drawn key {key:?}: {e}");
                Value::Null
            }
        };
        Ok(Reply {
            key: Some((self.presenter.format_key)(&key)),
            value,
        })
    }

    pub async fn answer(&self, correct: bool) -> Result<(), CoreError> {
        let mut s = self.session.lock().await;
        let Some(key) = s.current.clone() else {
            return Err(CoreError::NoSuchDrawnKey(String::new()));
        };
        s.deck.answer(&key, correct).await?;
        s.current = None;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), CoreError> {
        let mut s = self.session.lock().await;
        let Some(key) = s.current.clone() else {
            return Err(CoreError::NoSuchDrawnKey(String::new()));
        };
        s.deck.delete(&key).await?;
        s.current = None;
        Ok(())
    }

    /// Adds `key` if the dictionary knows it. `false` means the lookup failed and
    /// nothing changed.
    pub async fn add(&self, key: &str) -> Result<bool, CoreError> {
        match self.dictionary.lookup(key).await {
            Ok(_) => {}
            Err(CoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }
        self.session.lock().await.deck.add(key).await?;
        Ok(true)
    }

    pub async fn progress(&self) -> Progress {
        self.session.lock().await.deck.progress()
    }

    pub async fn current(&self) -> Option<Key> {
        self.session.lock().await.current.clone()
    }
}
