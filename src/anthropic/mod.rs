pub mod client;
pub mod error;
pub mod extract;
pub mod types;

pub use client::{AnthropicClient, MessageSender};
pub use error::AnthropicError;
pub use extract::AnthropicExtractor;
pub use types::{Message, MessagesRequest, MessagesResponse, Usage};
