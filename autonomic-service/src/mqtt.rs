use autonomic_core::{HealEvent, ReportSink};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, warn};

use crate::config::MqttConf;

/// Publishes each report event as JSON on one topic.
///
/// `report` runs on the tick path, so it only queues (`try_publish`);
/// a full queue drops the event with a warning.
pub struct MqttReportSink {
    client: AsyncClient,
    topic: String,
    eventloop: JoinHandle<()>,
}

impl MqttReportSink {
    /// Connects lazily: the event loop task keeps retrying in the background.
    pub fn spawn(conf: &MqttConf) -> Self {
        let mut opts = MqttOptions::new("autonomic-service", &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));

        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        let handle = task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(event) => debug!(?event, "MQTT event"),
                    Err(e) => {
                        warn!("MQTT connection error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic: conf.topic.clone(),
            eventloop: handle,
        }
    }

    /// Topic every event is published on
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// JSON payload published for one event
pub fn encode_event(event: &HealEvent) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(event)
}

impl ReportSink for MqttReportSink {
    fn report(&self, event: &HealEvent) {
        let payload = match encode_event(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode heal event: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
        {
            warn!(topic = %self.topic, "Dropped heal event: {:?}", e);
        }
    }
}

impl Drop for MqttReportSink {
    fn drop(&mut self) {
        self.eventloop.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonomic_core::{AnomalyKind, ConfirmedAnomaly};
    use serde_json::Value;

    #[test]
    fn test_encoded_confirmation_payload() {
        let event = HealEvent::AnomalyConfirmed(ConfirmedAnomaly {
            kind: AnomalyKind::HighMemory,
            observed: 85.0,
            timestamp: chrono::Utc::now(),
        });

        let payload: Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(payload["event"], "anomaly_confirmed");
        assert_eq!(payload["kind"], "HIGH_MEMORY");
        assert_eq!(payload["observed"], 85.0);
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn test_encoded_timeout_payload() {
        let event = HealEvent::RemediationTimedOut {
            kind: AnomalyKind::SlowResponse,
            action: "Latency Optimization Action".to_string(),
            timeout_ms: 10_000,
        };

        let payload: Value = serde_json::from_slice(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "event": "remediation_timed_out",
                "kind": "SLOW_RESPONSE",
                "action": "Latency Optimization Action",
                "timeout_ms": 10_000,
            })
        );
    }
}
