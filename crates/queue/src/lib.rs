pub mod batcher;
pub mod consumer;
pub mod error;
pub mod sqs;

pub use batcher::MicroBatcher;
pub use consumer::{QueueConsumer, QueueHealth, QueueMessage};
pub use error::QueueError;
pub use sqs::SqsConsumer;
