//! Wire-format chat messages.
//!
//! A message carries a role and a list of typed content parts. The
//! diagnosis run keeps image parts alive across stages while the text
//! part is swapped out for each stage prompt (clean mode).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Image reference carried by an `image_url` part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

/// One typed content part of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

impl ContentPart {
    pub fn is_text(&self) -> bool {
        matches!(self, ContentPart::Text { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

/// One chat message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: &str) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::Text {
                text: text.to_string(),
            }],
        }
    }

    pub fn user() -> Self {
        Self {
            role: Role::User,
            content: Vec::new(),
        }
    }
}

/// Append an image part to the last message.
///
/// With `clean` set, image parts are first removed from every user
/// message, leaving at most the one being appended.
pub fn push_image(messages: &mut [ChatMessage], url: &str, clean: bool) {
    if clean {
        strip_user_parts(messages, ContentPart::is_image);
    }
    if let Some(last) = messages.last_mut() {
        last.content.push(ContentPart::ImageUrl {
            image_url: ImageRef {
                url: url.to_string(),
            },
        });
    }
}

/// Append a text part to the last message.
///
/// With `clean` set, text parts are first removed from every user message,
/// so the appended text replaces any previous stage prompt.
pub fn push_text(messages: &mut [ChatMessage], text: &str, clean: bool) {
    if clean {
        strip_user_parts(messages, ContentPart::is_text);
    }
    if let Some(last) = messages.last_mut() {
        last.content.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
}

fn strip_user_parts(messages: &mut [ChatMessage], matches: fn(&ContentPart) -> bool) {
    for message in messages.iter_mut() {
        if message.role == Role::User {
            message.content.retain(|part| !matches(part));
        }
    }
}
