use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("invalid weights: {0}")]
    InvalidWeights(&'static str),
    #[error("invalid level: {0}")]
    InvalidLevel(usize),
    #[error("bag is empty")]
    EmptyBag,
    #[error("key has not been drawn: {0}")]
    NoSuchDrawnKey(String),
    #[error("a drawn key must be answered or deleted before drawing again")]
    DrawPending,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
    #[error("corrupt record for key {key:?}: level {code}")]
    CorruptRecord { key: String, code: i64 },
    #[error("update stopped after {committed} keys; {} keys not added", failed.len())]
    PartialUpdate {
        committed: usize,
        failed: Vec<String>,
        #[source]
        source: Box<CoreError>,
    },
}
