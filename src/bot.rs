//! Turns a batch of Lingr events into the bot's reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, info};

use crate::command::{Command, file_name, strip_address};
use crate::docomo::{self, Session};
use crate::lingr::{Message, Status};

/// Reply when nothing could be read from an image.
pub const DONT_UNDERSTAND: &str = "わかりません";

/// Default cap on a downloaded image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] docomo::Error),
    #[error("Get {url}: {source}")]
    Fetch { url: Url, source: reqwest::Error },
    #[error("Get {url}: {status}")]
    FetchStatus { url: Url, status: reqwest::StatusCode },
    #[error("Get {url}: image larger than {limit} bytes")]
    ImageTooLarge { url: Url, limit: usize },
}

/// Dialogue sessions, one per room. Created on first use, never persisted.
#[derive(Debug, Default)]
pub struct Sessions {
    rooms: Mutex<HashMap<String, Arc<Session>>>,
}

impl Sessions {
    pub fn get(&self, room: &str) -> Arc<Session> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.entry(room.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct Bot {
    docomo: docomo::Client,
    /// For fetching user-supplied image URLs.
    http: reqwest::Client,
    read_images: bool,
    max_image_bytes: usize,
    sessions: Sessions,
}

impl Bot {
    pub fn new(docomo: docomo::Client, read_images: bool, max_image_bytes: usize) -> Self {
        Self {
            docomo,
            http: reqwest::Client::new(),
            read_images,
            max_image_bytes,
            sessions: Sessions::default(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.docomo.persona().nickname
    }

    /// Reply lines for every message in the batch addressed to the bot.
    ///
    /// The first failure aborts the batch; replies already produced are dropped.
    pub async fn handle_status(&self, status: &Status) -> Result<Vec<String>, Error> {
        let mut replies = Vec::new();
        for message in status.messages() {
            if let Some(reply) = self.handle_message(message).await? {
                replies.push(reply);
            }
        }
        Ok(replies)
    }

    async fn handle_message(&self, message: &Message) -> Result<Option<String>, Error> {
        let Some(text) = strip_address(&message.text, self.nickname()) else {
            return Ok(None);
        };

        let preview: String = text.chars().take(100).collect();
        info!("📨 {} in {}: \"{preview}\"", message.nickname, message.room);

        let answer = match Command::classify(text, self.read_images) {
            Command::ReadImage(url) => self.read_image(&url).await?,
            Command::Chat(utt) => self.chat(&message.room, &utt).await?,
        };

        let reply = format!("{}: {}", message.nickname, answer);
        info!("💬 {reply}");
        Ok(Some(reply))
    }

    async fn chat(&self, room: &str, utt: &str) -> Result<String, Error> {
        let session = self.sessions.get(room);
        let reply = self.docomo.dialogue(&session, utt).await?;
        debug!("Dialogue: mode={} da={}", reply.mode, reply.da);
        Ok(reply.utt)
    }

    async fn read_image(&self, url: &Url) -> Result<String, Error> {
        let fetch_err = |source| Error::Fetch {
            url: url.clone(),
            source,
        };

        let too_large = || Error::ImageTooLarge {
            url: url.clone(),
            limit: self.max_image_bytes,
        };

        let mut response = self.http.get(url.clone()).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchStatus {
                url: url.clone(),
                status,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Reject early on a declared length, then enforce the cap while streaming
        if response
            .content_length()
            .is_some_and(|len| len > self.max_image_bytes as u64)
        {
            return Err(too_large());
        }
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_err)? {
            if data.len() + chunk.len() > self.max_image_bytes {
                return Err(too_large());
            }
            data.extend_from_slice(&chunk);
        }

        let result = self
            .docomo
            .recognize_characters(&content_type, &file_name(url), &data)
            .await?;

        let fragments = result.fragments();
        if fragments.is_empty() {
            Ok(DONT_UNDERSTAND.to_string())
        } else {
            Ok(fragments.join(", "))
        }
    }
}
