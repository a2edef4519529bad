use crate::CoreError;
use rand::Rng;

/// Unordered multiset with O(1) insert and O(1) removal of a uniformly random item.
///
/// Removal swaps the chosen slot with the last one and truncates, so the backing
/// order is meaningless and never exposed.
#[derive(Clone, Debug)]
pub struct RandomBag<T> {
    items: Vec<T>,
}

impl<T> Default for RandomBag<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> RandomBag<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.extend(items);
    }

    pub fn remove_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<T, CoreError> {
        if self.items.is_empty() {
            return Err(CoreError::EmptyBag);
        }
        let index = rng.gen_range(0..self.items.len());
        Ok(self.items.swap_remove(index))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Moves every item of `other` into `self`, leaving `other` empty.
    pub fn absorb(&mut self, other: &mut RandomBag<T>) {
        self.items.append(&mut other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> FromIterator<T> for RandomBag<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
