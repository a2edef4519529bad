use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use leveldeck_core::{CoreError, DeckService, Reply, Request};
use log::error;
use std::sync::Arc;

use crate::api::dto::{status_for, ErrorOut};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeckService>,
}

type ApiError = (StatusCode, Json<ErrorOut>);

fn reject(err: CoreError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("command failed: {err}");
    }
    (status, Json(ErrorOut { error: err.to_string() }))
}

/// `POST /` with `{"cmd": "draw" | "progress" | "answer" | "delete" | "add", "arg": ...}`.
pub async fn command(State(st): State<Arc<AppState>>, body: Bytes) -> Result<Json<Reply>, ApiError> {
    let request = Request::from_json(&body).map_err(reject)?;
    let reply = st.service.handle(request).await.map_err(reject)?;
    Ok(Json(reply))
}

pub async fn progress(State(st): State<Arc<AppState>>) -> Json<Vec<usize>> {
    Json(st.service.progress().await.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leveldeck_core::memory::MemoryStore;
    use leveldeck_core::{Deck, DeckConfig, MapDictionary, Presenter};
    use serde_json::json;

    async fn test_state() -> Arc<AppState> {
        let deck = Deck::open(
            Arc::new(MemoryStore::new()),
            DeckConfig { weights: Some(vec![1.0, 1.0]), seed: Some(2), ..DeckConfig::default() },
        )
        .await
        .unwrap();
        let dict: MapDictionary = [("ni3".to_string(), json!("you"))].into_iter().collect();
        Arc::new(AppState {
            service: Arc::new(DeckService::new(deck, Arc::new(dict), Presenter::default())),
        })
    }

    async fn send(st: &Arc<AppState>, body: &str) -> Result<Json<Reply>, ApiError> {
        command(State(st.clone()), Bytes::from(body.to_string())).await
    }

    #[tokio::test]
    async fn test_add_draw_answer() {
        let st = test_state().await;
        let Json(r) = send(&st, r#"{"cmd":"add","arg":"ni3"}"#).await.unwrap();
        assert_eq!(r.value, json!(true));

        let Json(r) = send(&st, r#"{"cmd":"draw"}"#).await.unwrap();
        assert_eq!(r.key.as_deref(), Some("ni3"));
        assert_eq!(r.value, json!("you"));

        send(&st, r#"{"cmd":"answer","arg":true}"#).await.unwrap();
        let Json(p) = progress(State(st.clone())).await;
        assert_eq!(p, vec![0, 0, 1, 0]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_bad_request() {
        let st = test_state().await;
        let (status, _) = send(&st, r#"{"cmd":"shuffle"}"#).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_answer_without_draw_conflicts() {
        let st = test_state().await;
        let (status, Json(body)) = send(&st, r#"{"cmd":"answer","arg":false}"#).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.error.contains("not been drawn"));
    }

    #[tokio::test]
    async fn test_add_unknown_key_reports_false() {
        let st = test_state().await;
        let Json(r) = send(&st, r#"{"cmd":"add","arg":"zzz"}"#).await.unwrap();
        assert_eq!(r.key.as_deref(), Some("valid"));
        assert_eq!(r.value, json!(false));
    }
}
