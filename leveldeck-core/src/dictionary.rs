use crate::CoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Content lookup for flashcard keys. Used by `DeckService`, never by `Deck`.
#[async_trait]
pub trait Dictionary: Send + Sync {
    /// Fails with `CoreError::NotFound` when the key has no content.
    async fn lookup(&self, key: &str) -> Result<Value, CoreError>;
}

#[derive(Default)]
pub struct MapDictionary {
    entries: HashMap<String, Value>,
}

impl MapDictionary {
    pub fn new(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, Value)> for MapDictionary {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl Dictionary for MapDictionary {
    async fn lookup(&self, key: &str) -> Result<Value, CoreError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))
    }
}
