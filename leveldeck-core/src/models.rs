use crate::CoreError;
use serde::{Deserialize, Serialize};

pub type Key = String;

pub const DELETED_CODE: i64 = -2;
pub const COMPLETED_CODE: i64 = -1;

/// Durable state of a key. Stores see it as an integer code:
/// `-2` deleted, `-1` completed, `n >= 0` active at level `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Active(usize),
    Completed,
    Deleted,
}

impl Level {
    pub fn code(&self) -> i64 {
        match self {
            Level::Active(n) => *n as i64,
            Level::Completed => COMPLETED_CODE,
            Level::Deleted => DELETED_CODE,
        }
    }

    pub fn from_code(code: i64) -> Option<Level> {
        match code {
            DELETED_CODE => Some(Level::Deleted),
            COMPLETED_CODE => Some(Level::Completed),
            n if n >= 0 => Some(Level::Active(n as usize)),
            _ => None,
        }
    }
}

/// Relative draw probability per level. Never empty; entries finite and non-negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Weights(Vec<f64>);

impl Weights {
    pub fn new(values: Vec<f64>) -> Result<Self, CoreError> {
        if values.is_empty() {
            return Err(CoreError::InvalidWeights("at least one weight is needed"));
        }
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CoreError::InvalidWeights("weights must be finite and non-negative"));
        }
        Ok(Self(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for Weights {
    type Error = CoreError;
    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        Weights::new(v)
    }
}

impl From<Weights> for Vec<f64> {
    fn from(w: Weights) -> Self {
        w.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Overrides (and persists over) the stored weights when set.
    pub weights: Option<Vec<f64>>,
    pub default_level: usize,
    /// How many drawn keys may await an answer at once.
    pub max_outstanding: usize,
    pub history_size: usize,
    pub seed: Option<u64>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            weights: None,
            default_level: 0,
            max_outstanding: 1,
            history_size: 5,
            seed: None,
        }
    }
}

/// Snapshot of key counts: deleted, one entry per level, completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub deleted: usize,
    pub levels: Vec<usize>,
    pub completed: usize,
}

impl Progress {
    /// Flattens to `(deleted, level 0, .., level W-1, completed)`.
    pub fn to_vec(&self) -> Vec<usize> {
        let mut v = Vec::with_capacity(self.levels.len() + 2);
        v.push(self.deleted);
        v.extend_from_slice(&self.levels);
        v.push(self.completed);
        v
    }

    pub fn total(&self) -> usize {
        self.deleted + self.completed + self.levels.iter().sum::<usize>()
    }
}

impl Serialize for Progress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes() {
        assert_eq!(Level::from_code(-2), Some(Level::Deleted));
        assert_eq!(Level::from_code(-1), Some(Level::Completed));
        assert_eq!(Level::from_code(3), Some(Level::Active(3)));
        assert_eq!(Level::from_code(-3), None);
        assert_eq!(Level::Active(4).code(), 4);
        assert_eq!(Level::Deleted.code(), -2);
    }

    #[test]
    fn weights_validation() {
        assert!(matches!(Weights::new(vec![]), Err(CoreError::InvalidWeights(_))));
        assert!(Weights::new(vec![1.0, -1.0]).is_err());
        assert!(Weights::new(vec![f64::NAN]).is_err());
        assert_eq!(Weights::new(vec![0.0, 2.5]).unwrap().len(), 2);

        let parsed: Result<Weights, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());
        let parsed: Weights = serde_json::from_str("[1000, 10, 1]").unwrap();
        assert_eq!(parsed.as_slice(), &[1000.0, 10.0, 1.0]);
    }

    #[test]
    fn progress_flattens_in_order() {
        let p = Progress { deleted: 1, levels: vec![2, 3], completed: 4 };
        assert_eq!(p.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(p.total(), 10);
        assert_eq!(serde_json::to_string(&p).unwrap(), "[1,2,3,4]");
    }
}
