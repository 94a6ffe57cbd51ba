//! docomo developer API client: natural dialogue and character recognition.
//!
//! The dialogue endpoint is stateful on the caller's side: every reply carries
//! `context` and `mode` tokens which must be echoed on the next request to
//! continue the conversation (e.g. a shiritori game). Those tokens live in a
//! [`Session`], which the caller owns and passes into [`Client::dialogue`].

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DIALOGUE_URL: &str = "https://api.apigw.smt.docomo.ne.jp/dialogue/v1/dialogue";
pub const CHARACTER_RECOGNITION_URL: &str =
    "https://api.apigw.smt.docomo.ne.jp/characterRecognition/v1/line";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Vendor endpoint URLs. The API key is appended as the `APIKEY` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub dialogue: String,
    pub character_recognition: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dialogue: DIALOGUE_URL.to_string(),
            character_recognition: CHARACTER_RECOGNITION_URL.to_string(),
        }
    }
}

/// The identity the bot presents to the dialogue API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// Up to 10 characters.
    pub nickname: String,
    /// Reading of the nickname, katakana only.
    pub nickname_y: String,
    /// 男 or 女
    pub sex: String,
    /// A, B, AB or O
    pub bloodtype: String,
    #[serde(rename = "birthdateY")]
    pub birth_date_y: u32,
    #[serde(rename = "birthdateM")]
    pub birth_date_m: u32,
    #[serde(rename = "birthdateD")]
    pub birth_date_d: u32,
    pub age: u32,
    /// Zodiac sign, e.g. 牡羊座
    pub constellations: String,
    /// Region name from the vendor's place list.
    pub place: String,
}

/// Continuation tokens from the most recent successful dialogue reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub context: String,
    pub mode: String,
}

/// One conversation with the dialogue API.
///
/// The lock is held for a whole dialogue round-trip, so concurrent turns in the
/// same conversation are serialized and each one sees the tokens left by the
/// previous one.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tokens (empty before the first successful turn).
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }
}

#[derive(Serialize)]
struct DialogueRequest<'a> {
    #[serde(flatten)]
    persona: &'a Persona,
    /// Up to 255 characters.
    context: &'a str,
    /// dialog or srtr
    mode: &'a str,
    /// Up to 255 characters.
    utt: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DialogueResponse {
    pub utt: String,
    pub yomi: String,
    pub mode: String,
    pub da: String,
    pub context: String,
}

/// A piece of recognized text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TextFragment {
    #[serde(rename = "@text")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Words {
    pub word: Vec<TextFragment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CharacterRecognitionResult {
    pub words: Words,
    pub message: TextFragment,
}

impl CharacterRecognitionResult {
    /// Non-empty recognized words, or the fallback message when there are none.
    pub fn fragments(&self) -> Vec<&str> {
        let words: Vec<&str> = self
            .words
            .word
            .iter()
            .map(|w| w.text.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        if words.is_empty() && !self.message.text.is_empty() {
            return vec![self.message.text.as_str()];
        }
        words
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The API answered with something other than 200 OK.
    #[error("{api}: {status}")]
    Status { api: &'static str, status: StatusCode },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct Client {
    http: reqwest::Client,
    apikey: String,
    persona: Persona,
    endpoints: Endpoints,
}

impl Client {
    /// Build a client. Certificate verification stays on unless `insecure_tls` is set.
    pub fn new(
        apikey: String,
        persona: Persona,
        endpoints: Endpoints,
        insecure_tls: bool,
    ) -> Result<Self, Error> {
        if insecure_tls {
            warn!("TLS certificate verification disabled for the docomo API");
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            http,
            apikey,
            persona,
            endpoints,
        })
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Send one utterance. On success the session's context and mode are
    /// replaced by the reply's; on any failure the session is left as it was.
    pub async fn dialogue(&self, session: &Session, utt: &str) -> Result<DialogueResponse, Error> {
        let mut state = session.state.lock().await;

        let request = DialogueRequest {
            persona: &self.persona,
            context: &state.context,
            mode: &state.mode,
            utt,
        };

        let response = self
            .http
            .post(&self.endpoints.dialogue)
            .query(&[("APIKEY", self.apikey.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!("Dialogue response status: {status}");
        if status != StatusCode::OK {
            return Err(Error::Status {
                api: "Dialogue",
                status,
            });
        }

        let body = response.text().await?;
        let reply: DialogueResponse = serde_json::from_str(&body)?;

        state.context = reply.context.clone();
        state.mode = reply.mode.clone();
        Ok(reply)
    }

    /// Upload an image as the multipart part `image` and return what was read.
    pub async fn recognize_characters(
        &self,
        content_type: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<CharacterRecognitionResult, Error> {
        info!("🔎 Recognizing {filename} ({content_type}, {} bytes)", data.len());

        let form = Form::new().part("image", image_part(content_type, filename, data)?);

        let response = self
            .http
            .post(&self.endpoints.character_recognition)
            .query(&[("APIKEY", self.apikey.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("CharacterRecognition response status: {status}");

        if status != StatusCode::OK {
            debug!("CharacterRecognition error body: {body}");
            return Err(Error::Status {
                api: "CharacterRecognition",
                status,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn image_part(content_type: &str, filename: &str, data: &[u8]) -> Result<Part, Error> {
    let part = || Part::bytes(data.to_vec()).file_name(filename.to_string());
    match part().mime_str(content_type) {
        Ok(p) => Ok(p),
        Err(e) => {
            debug!("Unusable content type {content_type:?} ({e}), sending {FALLBACK_CONTENT_TYPE}");
            Ok(part().mime_str(FALLBACK_CONTENT_TYPE)?)
        }
    }
}
