use crate::store::{LevelStore, WriteBatch};
use crate::{CoreError, Weights};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Non-durable store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    levels: RwLock<HashMap<String, i64>>,
    weights: RwLock<Option<Weights>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: Weights) -> Self {
        Self {
            levels: RwLock::new(HashMap::new()),
            weights: RwLock::new(Some(weights)),
        }
    }

    /// Writes a raw code without validation, e.g. to seed a corrupt record.
    pub fn insert_raw(&self, key: impl Into<String>, code: i64) {
        self.levels.write().insert(key.into(), code);
    }
}

#[async_trait]
impl LevelStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError> {
        Ok(self.levels.read().get(key).copied())
    }

    async fn entries(&self) -> Result<Vec<(String, i64)>, CoreError> {
        Ok(self
            .levels
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    async fn weights(&self) -> Result<Option<Weights>, CoreError> {
        Ok(self.weights.read().clone())
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), CoreError> {
        let mut levels = self.levels.write();
        for (key, level) in &batch.levels {
            levels.insert(key.clone(), level.code());
        }
        if let Some(w) = &batch.weights {
            *self.weights.write() = Some(w.clone());
        }
        Ok(())
    }
}
