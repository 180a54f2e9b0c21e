pub mod batch_client;
pub mod chat_client;

pub use batch_client::BatchClient;
pub use chat_client::{ApiErrorKind, ChatClient};
