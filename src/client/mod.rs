//! Completion endpoint client: wire-format chat messages and the HTTP
//! backend that talks to the local vision-language model server.

pub mod llama;
pub mod message;

pub use llama::{CompletionBackend, LlamaClient};
pub use message::{push_image, push_text, ChatMessage, ContentPart, ImageRef, Role};
