//! What an addressed chat message asks the bot to do.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

// ASCII whitespace only: a full-width space does not separate the URL.
static READ_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^これ読んで[ \t\n\f\r]+((?:http|https)://[^ \t\n\f\r]+)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// "これ読んで <url>": read the text in the image at the URL.
    ReadImage(Url),
    /// Anything else is small talk for the dialogue API.
    Chat(String),
}

impl Command {
    /// Classify the body of an addressed message (nickname prefix already removed).
    pub fn classify(text: &str, read_images: bool) -> Self {
        if read_images
            && let Some(caps) = READ_IMAGE.captures(text)
            && let Ok(url) = Url::parse(&caps[1])
        {
            return Self::ReadImage(url);
        }
        Self::Chat(text.to_string())
    }
}

/// If `text` is addressed to `nickname` ("nickname: ..."), return the rest
/// with the prefix removed once and surrounding whitespace trimmed.
pub fn strip_address<'a>(text: &'a str, nickname: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(nickname)?.strip_prefix(':')?;
    Some(rest.trim())
}

/// Filename to upload for an image URL: the last path segment.
pub fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("image")
        .to_string()
}
