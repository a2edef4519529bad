use crate::{CoreError, Level, Weights};
use async_trait::async_trait;

pub mod memory;

/// Writes that must land together or not at all.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    pub levels: Vec<(String, Level)>,
    pub weights: Option<Weights>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, key: impl Into<String>, level: Level) -> Self {
        self.levels.push((key.into(), level));
        self
    }

    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.weights.is_none()
    }
}

/// Durable key -> level map plus a single weight vector kept in its own namespace.
///
/// Records are never physically removed; deletion is the `Level::Deleted` tag.
/// A successful return from `commit` means the batch is durable.
#[async_trait]
pub trait LevelStore: Send + Sync {
    /// Raw level code of `key`, if the key was ever stored.
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError>;

    /// Every stored `(key, code)` pair, in no particular order.
    async fn entries(&self) -> Result<Vec<(String, i64)>, CoreError>;

    async fn weights(&self) -> Result<Option<Weights>, CoreError>;

    async fn commit(&self, batch: &WriteBatch) -> Result<(), CoreError>;

    async fn set(&self, key: &str, level: Level) -> Result<(), CoreError> {
        self.commit(&WriteBatch::new().level(key, level)).await
    }

    async fn set_weights(&self, weights: &Weights) -> Result<(), CoreError> {
        self.commit(&WriteBatch::new().weights(weights.clone())).await
    }

    async fn contains(&self, key: &str) -> Result<bool, CoreError> {
        Ok(self.get(key).await?.is_some())
    }
}
