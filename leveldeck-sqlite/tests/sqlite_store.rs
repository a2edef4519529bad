use leveldeck_core::{
    CoreError, Deck, DeckConfig, Dictionary, Level, LevelStore, Weights, WriteBatch,
};
use leveldeck_sqlite::{SqliteDictionary, SqliteStore};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn commit_and_read_back() {
    let store = SqliteStore::open_memory().await.unwrap();
    assert_eq!(store.weights().await.unwrap(), None);
    assert_eq!(store.get("a").await.unwrap(), None);

    let batch = WriteBatch::new()
        .level("a", Level::Active(2))
        .level("b", Level::Completed)
        .weights(Weights::new(vec![10.0, 5.0, 1.0]).unwrap());
    store.commit(&batch).await.unwrap();

    assert_eq!(store.get("a").await.unwrap(), Some(2));
    assert_eq!(store.get("b").await.unwrap(), Some(-1));
    assert_eq!(
        store.weights().await.unwrap().unwrap().as_slice(),
        &[10.0, 5.0, 1.0]
    );

    store.set("a", Level::Deleted).await.unwrap();
    let mut entries = store.entries().await.unwrap();
    entries.sort();
    assert_eq!(entries, vec![("a".to_string(), -2), ("b".to_string(), -1)]);
}

#[tokio::test]
async fn weights_do_not_collide_with_card_keys() {
    let store = SqliteStore::open_memory().await.unwrap();
    store
        .set_weights(&Weights::new(vec![1.0]).unwrap())
        .await
        .unwrap();
    store.set("__weights__", Level::Active(0)).await.unwrap();
    store.set("weights", Level::Active(0)).await.unwrap();
    assert_eq!(store.weights().await.unwrap().unwrap().len(), 1);
    assert_eq!(store.entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn deck_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("levels.sqlite3");

    {
        let store = Arc::new(SqliteStore::open_file(&path).await.unwrap());
        let mut deck = Deck::open(
            store,
            DeckConfig {
                weights: Some(vec![1.0, 1.0]),
                seed: Some(1),
                ..DeckConfig::default()
            },
        )
        .await
        .unwrap();
        deck.update(["x", "y", "z"]).await.unwrap();
        let k = deck.draw().unwrap().unwrap();
        deck.answer(&k, true).await.unwrap();
        let k = deck.draw().unwrap().unwrap();
        deck.delete(&k).await.unwrap();
        assert_eq!(deck.progress().total(), 3);
    }

    let store = Arc::new(SqliteStore::open_file(&path).await.unwrap());
    let deck = Deck::open(store, DeckConfig::default()).await.unwrap();
    let p = deck.progress();
    assert_eq!(p.deleted, 1);
    assert_eq!(p.total(), 3);
    assert_eq!(deck.weights().as_slice(), &[1.0, 1.0]);
}

#[tokio::test]
async fn corrupt_level_blocks_open() {
    let store = SqliteStore::open_memory().await.unwrap();
    store
        .set_weights(&Weights::new(vec![1.0]).unwrap())
        .await
        .unwrap();
    store.set("far", Level::Active(7)).await.unwrap();
    let err = Deck::open(Arc::new(store), DeckConfig::default()).await;
    assert!(matches!(err, Err(CoreError::CorruptRecord { code: 7, .. })));
}

#[tokio::test]
async fn dictionary_lookup() {
    let dict = SqliteDictionary::open_memory().await.unwrap();
    dict.insert("hao3", &json!({ "hao3": "good" })).await.unwrap();
    assert_eq!(dict.lookup("hao3").await.unwrap(), json!({ "hao3": "good" }));
    assert!(matches!(
        dict.lookup("nope").await,
        Err(CoreError::NotFound(_))
    ));
}
