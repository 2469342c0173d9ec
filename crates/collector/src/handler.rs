//! `handle_wake_up` — the Collector's Q1-triggered entry point (SPEC_FULL §4.5).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use pipeline_core::envelope::{Operation, Queue, QueueMessage as Envelope};
use pipeline_queue::QueueMessage as TransportMessage;
use pipeline_worker::{Disposition, MessageHandler};

use crate::pipeline::CollectorPipeline;
use crate::template::resolve_templates;

#[derive(Debug, Deserialize, Default)]
struct WakeUpPayload {
    #[serde(default)]
    #[allow(dead_code)]
    trigger: Option<String>,
    template_name: Option<String>,
}

pub struct CollectorHandler {
    pipeline: CollectorPipeline,
    config: pipeline_core::config::CollectorConfig,
}

impl CollectorHandler {
    pub fn new(pipeline: CollectorPipeline, config: pipeline_core::config::CollectorConfig) -> Self {
        Self { pipeline, config }
    }
}

#[async_trait]
impl MessageHandler for CollectorHandler {
    async fn handle(&self, message: TransportMessage) -> Result<Disposition, anyhow::Error> {
        let envelope: Envelope = match serde_json::from_str(&message.body) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed envelope, nacking");
                return Ok(Disposition::Nack);
            }
        };

        if let Err(e) = envelope.operation(Queue::CollectionRequests) {
            warn!(error = %e, "unknown operation, nacking for eventual DLQ redrive");
            return Ok(Disposition::Nack);
        }

        let payload: WakeUpPayload = match envelope.payload_as() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed wake_up payload, nacking for eventual DLQ redrive");
                return Ok(Disposition::Nack);
            }
        };

        let templates = match resolve_templates(&self.config, payload.template_name.as_deref(), None) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "could not resolve source templates, nacking for eventual DLQ redrive");
                return Ok(Disposition::Nack);
            }
        };

        match self.pipeline.run(templates, None).await {
            Ok((collection_id, stats)) => {
                info!(
                    collection_id = %collection_id,
                    collected = stats.collected,
                    published = stats.published,
                    "wake_up-triggered collection run complete"
                );
                Ok(Disposition::Ack)
            }
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "permanent collector failure, leaving for DLQ redrive");
                Ok(Disposition::Nack)
            }
            Err(e) => {
                warn!(error = %e, "transient collector failure, nacking for retry");
                Ok(Disposition::Nack)
            }
        }
    }
}
