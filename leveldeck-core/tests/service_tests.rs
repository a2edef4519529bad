use leveldeck_core::memory::MemoryStore;
use leveldeck_core::{
    html_entries, CoreError, Deck, DeckConfig, DeckService, MapDictionary, Presenter, Reply,
    Request,
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn service() -> DeckService {
    let store = Arc::new(MemoryStore::new());
    let deck = Deck::open(
        store,
        DeckConfig {
            weights: Some(vec![1.0, 1.0]),
            seed: Some(5),
            ..DeckConfig::default()
        },
    )
    .await
    .unwrap();
    let dict: MapDictionary = [
        ("ni3".to_string(), json!({ "ni3": "you" })),
        ("hao3".to_string(), json!("good")),
    ]
    .into_iter()
    .collect();
    DeckService::new(deck, Arc::new(dict), Presenter::default().with_value_formatter(html_entries))
}

#[test]
fn parses_protocol_requests() {
    assert_eq!(Request::from_json(br#"{"cmd":"draw"}"#).unwrap(), Request::Draw);
    assert_eq!(
        Request::from_json(br#"{"cmd":"answer","arg":true}"#).unwrap(),
        Request::Answer(true)
    );
    assert_eq!(
        Request::from_json(br#"{"cmd":"add","arg":"hao3"}"#).unwrap(),
        Request::Add("hao3".into())
    );
    assert!(matches!(
        Request::from_json(br#"{"cmd":"shuffle"}"#),
        Err(CoreError::Invalid(_))
    ));
    assert!(Request::from_json(b"not json").is_err());
}

#[test]
fn ignores_arg_on_commands_without_one() {
    assert_eq!(
        Request::from_json(br#"{"cmd":"progress","arg":""}"#).unwrap(),
        Request::Progress
    );
    assert_eq!(
        Request::from_json(br#"{"cmd":"delete","arg":0}"#).unwrap(),
        Request::Delete
    );
    assert_eq!(
        Request::from_json(br#"{"cmd":"draw","arg":null}"#).unwrap(),
        Request::Draw
    );
    assert!(matches!(
        Request::from_json(br#"{"cmd":"answer","arg":"yes"}"#),
        Err(CoreError::Invalid(_))
    ));
    assert!(matches!(
        Request::from_json(br#"{"cmd":"add"}"#),
        Err(CoreError::Invalid(_))
    ));
}

#[tokio::test]
async fn empty_deck_draws_null_key() {
    let svc = service().await;
    let reply = svc.handle(Request::Draw).await.unwrap();
    assert_eq!(reply, Reply { key: None, value: Value::Null });

    let reply = svc.handle(Request::Progress).await.unwrap();
    assert_eq!(reply.key.as_deref(), Some("progress"));
    assert_eq!(reply.value, json!([0, 0, 0, 0]));
}

#[tokio::test]
async fn add_requires_dictionary_entry() {
    let svc = service().await;
    let reply = svc.handle(Request::Add("zzz".into())).await.unwrap();
    assert_eq!(reply.value, Value::Bool(false));
    assert_eq!(svc.progress().await.to_vec(), vec![0, 0, 0, 0]);

    let reply = svc.handle(Request::Add("hao3".into())).await.unwrap();
    assert_eq!(reply.key.as_deref(), Some("valid"));
    assert_eq!(reply.value, Value::Bool(true));
    assert_eq!(svc.progress().await.to_vec(), vec![0, 1, 0, 0]);
}

#[tokio::test]
async fn draw_answer_cycle() {
    let svc = service().await;
    svc.add("ni3").await.unwrap();

    let reply = svc.handle(Request::Draw).await.unwrap();
    assert_eq!(reply.key.as_deref(), Some("ni3"));
    assert_eq!(reply.value, json!("ni3: you"));
    assert_eq!(svc.current().await.as_deref(), Some("ni3"));

    assert!(matches!(
        svc.handle(Request::Draw).await,
        Err(CoreError::DrawPending)
    ));

    svc.handle(Request::Answer(true)).await.unwrap();
    assert_eq!(svc.current().await, None);
    assert_eq!(svc.progress().await.to_vec(), vec![0, 0, 1, 0]);
}

#[tokio::test]
async fn delete_acts_on_current_draw() {
    let svc = service().await;
    assert!(matches!(
        svc.handle(Request::Delete).await,
        Err(CoreError::NoSuchDrawnKey(_))
    ));
    assert!(matches!(
        svc.handle(Request::Answer(false)).await,
        Err(CoreError::NoSuchDrawnKey(_))
    ));

    svc.add("hao3").await.unwrap();
    svc.handle(Request::Draw).await.unwrap();
    svc.handle(Request::Delete).await.unwrap();
    assert_eq!(svc.progress().await.to_vec(), vec![1, 0, 0, 0]);
    let reply = svc.handle(Request::Draw).await.unwrap();
    assert_eq!(reply.key, None);
}

#[tokio::test]
async fn answer_without_draw_leaves_empty_key_alone() {
    let store = Arc::new(MemoryStore::new());
    let deck = Deck::open(
        store,
        DeckConfig {
            weights: Some(vec![1.0, 1.0]),
            ..DeckConfig::default()
        },
    )
    .await
    .unwrap();
    let dict: MapDictionary = [(String::new(), json!("blank"))].into_iter().collect();
    let svc = DeckService::new(deck, Arc::new(dict), Presenter::default());

    assert!(svc.add("").await.unwrap());
    assert!(matches!(
        svc.answer(true).await,
        Err(CoreError::NoSuchDrawnKey(_))
    ));
    assert!(matches!(svc.delete().await, Err(CoreError::NoSuchDrawnKey(_))));
    assert_eq!(svc.progress().await.to_vec(), vec![0, 1, 0, 0]);

    let reply = svc.draw().await.unwrap();
    assert_eq!(reply.key.as_deref(), Some(""));
    svc.answer(true).await.unwrap();
    assert_eq!(svc.progress().await.to_vec(), vec![0, 0, 1, 0]);
}
