pub mod backoff;
pub mod chunker;
pub mod extractor;
pub mod reconciler;

pub use backoff::{Backoff, RetryPolicy};
pub use chunker::plan_chunks;
pub use extractor::{extract_line, extract_message_content, Content};
pub use reconciler::reconcile;
