pub mod job;
pub mod record;

pub use job::{JobStatus, RemoteJob};
pub use record::{tag_prompts, PromptRecord, ResultRecord, FIELD_SENTINEL, RECORD_SENTINEL};
