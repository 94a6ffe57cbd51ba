//! A stand-in for the docomo API and an image host, bound to a local port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use lingrbot::bot::{Bot, DEFAULT_MAX_IMAGE_BYTES};
use lingrbot::docomo::{self, Endpoints, Persona};

pub const NICKNAME: &str = "bot";
pub const APIKEY: &str = "test-key";
pub const IMAGE: &[u8] = b"\x89PNG fake image";

/// A character recognition upload as the fake API saw it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub query: HashMap<String, String>,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub dialogue: Vec<(HashMap<String, String>, Value)>,
    pub uploads: Vec<Upload>,
    pub image_gets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub dialogue_status: StatusCode,
    pub dialogue_reply: String,
    pub ocr_status: StatusCode,
    pub ocr_reply: Value,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            dialogue_status: StatusCode::OK,
            dialogue_reply: json!({
                "utt": "hello",
                "yomi": "ハロー",
                "mode": "dialog",
                "da": "0",
                "context": "ctx1"
            })
            .to_string(),
            ocr_status: StatusCode::OK,
            ocr_reply: json!({
                "words": { "word": [ { "@text": "東京" }, { "@text": "" }, { "@text": "タワー" } ] },
                "message": { "@text": "" }
            }),
        }
    }
}

#[derive(Default)]
struct Shared {
    recorded: Mutex<Recorded>,
    behavior: Mutex<Behavior>,
}

pub struct FakeApi {
    pub base: String,
    shared: Arc<Shared>,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());

        let app = Router::new()
            .route("/dialogue", post(dialogue))
            .route("/ocr", post(ocr))
            .route("/images/{name}", get(image))
            .with_state(shared.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self {
            base: format!("http://{addr}"),
            shared,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            dialogue: self.url("/dialogue"),
            character_recognition: self.url("/ocr"),
        }
    }

    pub fn client(&self) -> docomo::Client {
        let persona = Persona {
            nickname: NICKNAME.to_string(),
            nickname_y: "ボット".to_string(),
            sex: "女".to_string(),
            bloodtype: "B".to_string(),
            birth_date_y: 2001,
            birth_date_m: 4,
            birth_date_d: 1,
            age: 13,
            constellations: "牡羊座".to_string(),
            place: "東京".to_string(),
        };
        docomo::Client::new(APIKEY.to_string(), persona, self.endpoints(), false).unwrap()
    }

    pub fn router(&self, read_images: bool) -> Router {
        self.router_with_image_limit(read_images, DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn router_with_image_limit(&self, read_images: bool, max_image_bytes: usize) -> Router {
        let bot = Bot::new(self.client(), read_images, max_image_bytes);
        lingrbot::server::router(bot, PathBuf::from("."))
    }

    pub fn update(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.shared.behavior.lock().unwrap());
    }

    pub fn dialogue_requests(&self) -> Vec<Value> {
        let recorded = self.shared.recorded.lock().unwrap();
        recorded.dialogue.iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn dialogue_queries(&self) -> Vec<HashMap<String, String>> {
        let recorded = self.shared.recorded.lock().unwrap();
        recorded.dialogue.iter().map(|(query, _)| query.clone()).collect()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.shared.recorded.lock().unwrap().uploads.clone()
    }

    pub fn image_gets(&self) -> Vec<String> {
        self.shared.recorded.lock().unwrap().image_gets.clone()
    }
}

async fn dialogue(
    State(shared): State<Arc<Shared>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    shared.recorded.lock().unwrap().dialogue.push((query, body));
    let behavior = shared.behavior.lock().unwrap().clone();
    (
        behavior.dialogue_status,
        [(CONTENT_TYPE, "application/json")],
        behavior.dialogue_reply,
    )
        .into_response()
}

async fn ocr(
    State(shared): State<Arc<Shared>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    shared.recorded.lock().unwrap().uploads.push(Upload {
        query,
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    let behavior = shared.behavior.lock().unwrap().clone();
    (behavior.ocr_status, Json(behavior.ocr_reply)).into_response()
}

async fn image(State(shared): State<Arc<Shared>>, Path(name): Path<String>) -> Response {
    shared.recorded.lock().unwrap().image_gets.push(name.clone());
    if name.starts_with("missing") {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(CONTENT_TYPE, "image/png")], IMAGE.to_vec()).into_response()
}

/// A Lingr status with one message per text, all from `alice` in `room`.
pub fn status(room: &str, texts: &[&str]) -> String {
    let events: Vec<Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "event_id": i + 1,
                "message": {
                    "id": format!("{}", 100 + i),
                    "room": room,
                    "public_session_id": "abc",
                    "icon_url": "http://example.com/alice.png",
                    "type": "user",
                    "speaker_id": "alice",
                    "nickname": "alice",
                    "text": text,
                    "timestamp": "2015-01-01T12:00:00Z",
                    "local_id": null
                }
            })
        })
        .collect();
    json!({ "status": "ok", "counter": texts.len(), "events": events }).to_string()
}
