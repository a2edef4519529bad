use crate::store::{LevelStore, WriteBatch};
use crate::{CoreError, DeckConfig, Key, Level, Progress, RandomBag, Weights};
use log::{debug, info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Keys per durable batch in `Deck::update`.
pub const UPDATE_CHUNK: usize = 256;

/// Weighted level scheduler mirroring a `LevelStore` in memory.
///
/// Every key lives in exactly one place: a level bag, the drawn set, or one of the
/// two sentinel counters. Mutations write to the store first and touch memory only
/// once the write has succeeded, so a storage failure leaves the deck unchanged.
pub struct Deck {
    store: Arc<dyn LevelStore>,
    weights: Weights,
    default_level: usize,
    levels: Vec<RandomBag<Key>>,
    deleted: usize,
    completed: usize,
    drawn: HashMap<Key, usize>,
    max_outstanding: usize,
    history: VecDeque<Key>,
    history_size: usize,
    rng: StdRng,
}

impl Deck {
    /// Loads every record from `store` and partitions keys into level bags.
    ///
    /// Fails with `CorruptRecord` if any stored level is outside `[-2, W-1]`. A failed
    /// open writes nothing; configured weights are persisted only once every check passed.
    pub async fn open(store: Arc<dyn LevelStore>, config: DeckConfig) -> Result<Self, CoreError> {
        if config.max_outstanding == 0 {
            return Err(CoreError::Invalid("max_outstanding must be at least 1"));
        }
        let requested = config.weights.map(Weights::new).transpose()?;
        let (weights, resize, fresh) = match (store.weights().await?, requested) {
            (Some(stored), Some(req)) if stored != req => (stored, Some(req), false),
            (Some(stored), _) => (stored, None, false),
            (None, Some(req)) => (req, None, true),
            (None, None) => return Err(CoreError::InvalidWeights("no weights stored or configured")),
        };
        // Everything that can reject the open is checked before the first write.
        let final_width = resize.as_ref().map_or(weights.len(), Weights::len);
        if config.default_level >= final_width {
            return Err(CoreError::InvalidLevel(config.default_level));
        }

        let width = weights.len();
        let mut levels: Vec<RandomBag<Key>> = (0..width).map(|_| RandomBag::new()).collect();
        let (mut deleted, mut completed) = (0, 0);
        for (key, code) in store.entries().await? {
            match Level::from_code(code) {
                Some(Level::Active(n)) if n < width => levels[n].insert(key),
                Some(Level::Completed) => completed += 1,
                Some(Level::Deleted) => deleted += 1,
                _ => return Err(CoreError::CorruptRecord { key, code }),
            }
        }

        let mut deck = Self {
            store,
            weights,
            default_level: 0,
            levels,
            deleted,
            completed,
            drawn: HashMap::new(),
            max_outstanding: config.max_outstanding,
            history: VecDeque::with_capacity(config.history_size),
            history_size: config.history_size,
            rng: config
                .seed
                .map(StdRng::seed_from_u64)
                .unwrap_or_else(StdRng::from_entropy),
        };
        if fresh {
            deck.store.set_weights(&deck.weights).await?;
        }
        if let Some(w) = resize {
            deck.update_weights(w).await?;
        }
        deck.default_level = config.default_level;

        let p = deck.progress();
        info!(
            "deck loaded: {} active, {} completed, {} deleted, weights {:?}",
            p.levels.iter().sum::<usize>(),
            p.completed,
            p.deleted,
            deck.weights.as_slice()
        );
        Ok(deck)
    }

    pub fn width(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn default_level(&self) -> usize {
        self.default_level
    }

    pub fn set_default_level(&mut self, level: usize) -> Result<(), CoreError> {
        if level >= self.width() {
            return Err(CoreError::InvalidLevel(level));
        }
        self.default_level = level;
        Ok(())
    }

    /// Draws one key, choosing a level by weight among non-empty levels and then a
    /// key uniformly within it. `None` when no active key remains.
    pub fn draw(&mut self) -> Result<Option<Key>, CoreError> {
        if self.drawn.len() >= self.max_outstanding {
            return Err(CoreError::DrawPending);
        }
        let masked: Vec<f64> = self
            .weights
            .as_slice()
            .iter()
            .zip(&self.levels)
            .map(|(w, bag)| if bag.is_empty() { 0.0 } else { *w })
            .collect();
        if masked.iter().sum::<f64>() <= 0.0 {
            return Ok(None);
        }
        let dist = WeightedIndex::new(&masked)
            .map_err(|_| CoreError::InvalidWeights("weights cannot be sampled"))?;
        let level = dist.sample(&mut self.rng);
        let key = self.levels[level].remove_random(&mut self.rng)?;

        self.drawn.insert(key.clone(), level);
        if self.history_size > 0 {
            if self.history.len() == self.history_size {
                self.history.pop_front();
            }
            self.history.push_back(key.clone());
        }
        debug!("drew {key:?} from level {level}");
        Ok(Some(key))
    }

    /// Resolves a drawn key. Correct moves it up one level (or to completed from the
    /// top level); incorrect sends it back to level 0.
    pub async fn answer(&mut self, key: &str, correct: bool) -> Result<Level, CoreError> {
        let from = *self
            .drawn
            .get(key)
            .ok_or_else(|| CoreError::NoSuchDrawnKey(key.to_string()))?;
        let to = if !correct {
            Level::Active(0)
        } else if from + 1 < self.width() {
            Level::Active(from + 1)
        } else {
            Level::Completed
        };
        if to != Level::Active(from) {
            self.store.set(key, to).await?;
        }

        self.drawn.remove(key);
        match to {
            Level::Active(n) => self.levels[n].insert(key.to_string()),
            Level::Completed => self.completed += 1,
            Level::Deleted => unreachable!("answer never deletes"),
        }
        debug!("answered {key:?} correct={correct}: level {from} -> {to:?}");
        Ok(to)
    }

    /// Marks a drawn key deleted. It is counted from now on but never drawn again.
    pub async fn delete(&mut self, key: &str) -> Result<(), CoreError> {
        if !self.drawn.contains_key(key) {
            return Err(CoreError::NoSuchDrawnKey(key.to_string()));
        }
        self.store.set(key, Level::Deleted).await?;
        self.drawn.remove(key);
        self.deleted += 1;
        debug!("deleted {key:?}");
        Ok(())
    }

    /// Adds `key` at the default level. Known keys, in any state, are left alone.
    pub async fn add(&mut self, key: &str) -> Result<bool, CoreError> {
        if self.store.contains(key).await? {
            return Ok(false);
        }
        self.store
            .set(key, Level::Active(self.default_level))
            .await?;
        self.levels[self.default_level].insert(key.to_string());
        debug!("added {key:?} at level {}", self.default_level);
        Ok(true)
    }

    /// Bulk `add`. Returns the number of new keys.
    ///
    /// Keys are committed in chunks of `UPDATE_CHUNK`. If a chunk fails after others
    /// were committed, the error is `PartialUpdate` listing the keys not added.
    pub async fn update<I, S>(&mut self, keys: I) -> Result<usize, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Key>,
    {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for key in keys {
            let key = key.into();
            if !seen.insert(key.clone()) || self.store.contains(&key).await? {
                continue;
            }
            fresh.push(key);
        }

        let target = self.default_level;
        let mut committed = 0;
        for chunk in fresh.chunks(UPDATE_CHUNK) {
            let batch = WriteBatch {
                levels: chunk
                    .iter()
                    .map(|k| (k.clone(), Level::Active(target)))
                    .collect(),
                weights: None,
            };
            if let Err(e) = self.store.commit(&batch).await {
                if committed == 0 {
                    return Err(e);
                }
                warn!("update failed after {committed} keys: {e}");
                return Err(CoreError::PartialUpdate {
                    committed,
                    failed: fresh[committed..].to_vec(),
                    source: Box::new(e),
                });
            }
            self.levels[target].extend(chunk.iter().cloned());
            committed += chunk.len();
        }
        debug!("update added {committed} keys at level {target}");
        Ok(committed)
    }

    /// Moves every active key to the default level. Completed and deleted keys stay
    /// put; drawn keys stay drawn. Returns how many keys moved.
    pub async fn reset(&mut self) -> Result<usize, CoreError> {
        let target = self.default_level;
        let batch = WriteBatch {
            levels: self
                .levels
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != target)
                .flat_map(|(_, bag)| bag.iter().map(|k| (k.clone(), Level::Active(target))))
                .collect(),
            weights: None,
        };
        if batch.is_empty() {
            return Ok(0);
        }
        self.store.commit(&batch).await?;

        let mut merged = std::mem::take(&mut self.levels[target]);
        for (i, bag) in self.levels.iter_mut().enumerate() {
            if i != target {
                merged.absorb(bag);
            }
        }
        self.levels[target] = merged;
        info!("reset {} keys to level {target}", batch.levels.len());
        Ok(batch.levels.len())
    }

    /// Replaces the weight vector. Shrinking moves every key above the new top
    /// level down to it, in the store and in memory, in one batch.
    pub async fn update_weights(&mut self, weights: Weights) -> Result<(), CoreError> {
        let new_len = weights.len();
        if new_len <= self.default_level {
            return Err(CoreError::InvalidWeights(
                "number of weights must be greater than the default level",
            ));
        }
        let old_len = self.width();
        let mut batch = WriteBatch::new().weights(weights.clone());
        if new_len < old_len {
            let floor = Level::Active(new_len - 1);
            for bag in &self.levels[new_len..] {
                batch.levels.extend(bag.iter().map(|k| (k.clone(), floor)));
            }
            for (key, &level) in &self.drawn {
                if level >= new_len {
                    batch.levels.push((key.clone(), floor));
                }
            }
        }
        self.store.commit(&batch).await?;

        if new_len < old_len {
            let mut spill = self.levels.split_off(new_len);
            let top = &mut self.levels[new_len - 1];
            for bag in spill.iter_mut() {
                top.absorb(bag);
            }
            for level in self.drawn.values_mut() {
                if *level >= new_len {
                    *level = new_len - 1;
                }
            }
        } else {
            self.levels.resize_with(new_len, RandomBag::new);
        }
        info!(
            "weights changed from {old_len} to {new_len} levels, {} keys migrated",
            batch.levels.len()
        );
        self.weights = weights;
        Ok(())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            deleted: self.deleted,
            levels: self.levels.iter().map(RandomBag::len).collect(),
            completed: self.completed,
        }
    }

    /// Keys drawn but not yet answered or deleted.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.drawn.keys().map(String::as_str)
    }

    pub fn is_drawn(&self, key: &str) -> bool {
        self.drawn.contains_key(key)
    }

    /// Most recently drawn keys, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }
}
