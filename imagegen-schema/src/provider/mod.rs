//! Wire types of the upstream image-generation provider.
//!
//! The provider speaks an OpenAI-style chat-completions dialect with an `images` array on the
//! assistant message. Some deployments answer with a job handle instead, which is polled until it
//! yields a downloadable URL.

mod chat;
mod job;

pub use chat::{
    ChatImageRequest, ChatImageResponse, ChatMessage, Choice, ImageUrl, ResponseImage,
    ResponseMessage,
};
pub use job::{ProviderJob, ProviderJobStatus};
