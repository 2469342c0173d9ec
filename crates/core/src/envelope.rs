//! The application-level message envelope carried on every queue.
//!
//! Distinct from the transport-level message the `pipeline-queue` crate's SQS
//! binding receives (id/body/receipt_handle/attempt_count): this envelope is
//! what lives inside that transport message's `body`, JSON-serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

pub const CONTRACT_VERSION: &str = "1.0.0";

/// The four FIFO queues the pipeline communicates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    CollectionRequests,
    ProcessTopic,
    GenerateMarkdown,
    PublishSite,
}

impl Queue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::CollectionRequests => "collection-requests",
            Queue::ProcessTopic => "process-topic",
            Queue::GenerateMarkdown => "generate-markdown",
            Queue::PublishSite => "publish-site",
        }
    }
}

/// Operation tag carried in every envelope. The payload shape is determined
/// by `(queue, operation)` — see SPEC_FULL §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    WakeUp,
    ProcessTopic,
    GenerateMarkdown,
    PublishSiteRequest,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::WakeUp => "wake_up",
            Operation::ProcessTopic => "process_topic",
            Operation::GenerateMarkdown => "generate_markdown",
            Operation::PublishSiteRequest => "publish_site_request",
        }
    }

    /// Parse an operation tag, rejecting anything unknown rather than guessing.
    ///
    /// Per SPEC_FULL §6: unknown `operation` values MUST be rejected (left for
    /// DLQ after retries), never silently mapped to a default.
    pub fn parse(queue: Queue, raw: &str) -> Result<Self, CoreError> {
        let op = match raw {
            "wake_up" => Operation::WakeUp,
            "process_topic" => Operation::ProcessTopic,
            "generate_markdown" => Operation::GenerateMarkdown,
            "publish_site_request" => Operation::PublishSiteRequest,
            other => {
                return Err(CoreError::UnknownOperation {
                    queue: queue.as_str().to_string(),
                    operation: other.to_string(),
                })
            }
        };
        Ok(op)
    }
}

/// Envelope wrapping every inter-service message.
///
/// `payload` is left as a raw [`serde_json::Value`] here — unknown extra
/// fields on the payload MUST be ignored by readers (forward compatibility),
/// so each service decodes only the fields it knows about from this value
/// rather than `#[serde(deny_unknown_fields)]`-ing the whole envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    pub operation: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub dequeue_count: u32,
}

impl QueueMessage {
    /// Build a new envelope for a fresh outbound message (dequeue_count starts at 0).
    pub fn new(
        service_name: impl Into<String>,
        operation: Operation,
        correlation_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id,
            timestamp: Utc::now(),
            service_name: service_name.into(),
            operation: operation.as_str().to_string(),
            payload,
            dequeue_count: 0,
        }
    }

    /// Validate and return the typed operation for a given queue.
    pub fn operation(&self, queue: Queue) -> Result<Operation, CoreError> {
        Operation::parse(queue, &self.operation)
    }

    /// Deserialize `payload` into a caller-specified type, ignoring unknown
    /// extra fields (the type should not use `deny_unknown_fields`).
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, CoreError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| CoreError::InvalidPayload(e.to_string()))
    }
}
