//! Outbound device commands over the adapter's broker connection.

use rumqttc::QoS;
use serde_json::{Map, Value};
use std::sync::Arc;
use tagtrack_error::ingest::IngestError;
use tagtrack_models::constants::KIND_COMMAND;
use tracing::{debug, instrument};

use super::ClientEntry;

/// Publishes command envelopes to `<namespace>/<deviceId>/command`.
///
/// Fire-and-forget: when the broker link is down the call fails
/// immediately with `CommandUnavailable` instead of queueing. Retrying
/// is the caller's decision.
pub struct CommandDispatcher {
    shared_client: Arc<ClientEntry>,
    namespace: String,
}

impl CommandDispatcher {
    pub fn new(shared_client: Arc<ClientEntry>, namespace: impl Into<String>) -> Self {
        Self {
            shared_client,
            namespace: namespace.into(),
        }
    }

    /// Send one command to one device.
    ///
    /// The envelope is the payload object with a `command` field merged
    /// in; a `command` key inside the payload is overwritten.
    #[instrument(skip(self, payload))]
    pub async fn send(
        &self,
        device_id: &str,
        command: &str,
        payload: Map<String, Value>,
    ) -> Result<(), IngestError> {
        // rumqttc happily enqueues while disconnected; the health gate is
        // what gives commands their fail-fast contract.
        let client = self
            .shared_client
            .live()
            .ok_or(IngestError::CommandUnavailable)?;

        let topic = format!("{}/{}/{}", self.namespace, device_id, KIND_COMMAND);
        let mut envelope = payload;
        envelope.insert("command".to_string(), Value::String(command.to_string()));
        let body = serde_json::to_vec(&Value::Object(envelope)).map_err(|e| {
            IngestError::PublishFailed {
                topic: topic.clone(),
                reason: e.to_string(),
            }
        })?;

        client
            .publish(topic.clone(), QoS::AtLeastOnce, false, body)
            .await
            .map_err(|e| IngestError::PublishFailed {
                topic: topic.clone(),
                reason: e.to_string(),
            })?;

        debug!(topic = %topic, command = %command, "command dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ClientEntry;

    #[tokio::test]
    async fn send_fails_fast_while_disconnected() {
        let dispatcher =
            CommandDispatcher::new(Arc::new(ClientEntry::new_empty()), "tagtrack");
        let err = dispatcher
            .send("dev1", "locate", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::CommandUnavailable));
    }
}
