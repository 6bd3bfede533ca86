// ── Hub facade ──
//
// Single handle shared by the transport and the shell. The transport
// pushes typed inbound traffic through `deliver` and drains `next_outbound`;
// the shell reads the registry, drains the inbound queues and issues
// correlated requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{CorrelationKey, Outbound, Request};
use crate::config::HubConfig;
use crate::correlator::{Correlator, Outcome, PendingRequest};
use crate::error::CoreError;
use crate::model::{DataPacket, GatewayEvent, Inbound, Response, ResponseBody, SinkConfig};
use crate::queue::MessageQueue;
use crate::store::DeviceRegistry;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<HubInner>`.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    registry: DeviceRegistry,
    data: MessageQueue<DataPacket>,
    events: MessageQueue<GatewayEvent>,
    responses: Arc<MessageQueue<Response>>,
    outbound: Arc<MessageQueue<Outbound>>,
    correlator: Correlator,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let responses = Arc::new(MessageQueue::new());
        let outbound = Arc::new(MessageQueue::new());
        let correlator = Correlator::new(Arc::clone(&outbound), Arc::clone(&responses));

        Self {
            inner: Arc::new(HubInner {
                config,
                registry: DeviceRegistry::new(),
                data: MessageQueue::new(),
                events: MessageQueue::new(),
                responses,
                outbound,
                correlator,
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Route one inbound message: update the registry, then queue it.
    pub fn deliver(&self, inbound: Inbound) {
        let registry = &self.inner.registry;
        match inbound {
            Inbound::Status(event) => {
                debug!(gateway = %event.gateway_id, state = %event.state, "status event");
                registry.upsert_gateway(event.gateway_id.clone(), event.state);
                self.inner.events.push(event);
            }
            Inbound::Data(packet) => {
                registry.touch_gateway(packet.gateway_id.clone());
                registry.record_node(&packet);
                self.inner.data.push(packet);
            }
            Inbound::Response(response) => {
                debug!(key = %response.key, result = %response.result, "response received");
                self.absorb_response(&response);
                self.inner.responses.push(response);
            }
        }
    }

    /// Configuration responses are the only source of sink records.
    fn absorb_response(&self, response: &Response) {
        let registry = &self.inner.registry;
        let gateway_id = &response.key.gateway_id;
        registry.touch_gateway(gateway_id.clone());

        let configs: &[SinkConfig] = match &response.body {
            ResponseBody::Configs { configs } => configs.as_slice(),
            ResponseBody::SetConfig {
                config: Some(config),
            } => std::slice::from_ref(config),
            _ => &[],
        };
        for config in configs {
            if let Err(e) = registry.apply_sink_config(gateway_id, config.clone()) {
                warn!(error = %e, "dropping sink configuration");
            }
        }
    }

    pub fn drain_data(&self) -> Vec<DataPacket> {
        self.inner.data.drain_available()
    }

    pub fn drain_events(&self) -> Vec<GatewayEvent> {
        self.inner.events.drain_available()
    }

    pub fn drain_responses(&self) -> Vec<Response> {
        self.inner.responses.drain_available()
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Wait for the next message the transport should publish.
    pub async fn next_outbound(&self) -> Outbound {
        self.inner.outbound.pop().await
    }

    /// Queue an uncorrelated message for the transport.
    pub fn publish(&self, outbound: Outbound) {
        debug!(gateway = %outbound.gateway_id(), "queueing outbound message");
        self.inner.outbound.push(outbound);
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Publish `request` and wait up to `timeout` for a response under `key`.
    pub async fn request_and_wait(
        &self,
        key: CorrelationKey,
        request: Request,
        timeout: Duration,
    ) -> Result<Outcome, CoreError> {
        self.inner
            .correlator
            .request_and_wait(key, request, timeout)
            .await
    }

    /// Publish `request` under its own correlation key with the configured timeout.
    pub async fn execute(&self, request: Request) -> Result<Outcome, CoreError> {
        self.execute_with_timeout(request, self.inner.config.response_timeout)
            .await
    }

    pub async fn execute_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Outcome, CoreError> {
        let key = request.correlation_key();
        self.request_and_wait(key, request, timeout).await
    }

    pub fn pending(&self) -> Vec<PendingRequest> {
        self.inner.correlator.pending()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::command::{RequestKind, SinkTarget};
    use crate::model::{DeviceId, GatewayState, ResultCode};

    fn status(gateway: &str, state: GatewayState) -> Inbound {
        Inbound::Status(GatewayEvent {
            gateway_id: gateway.into(),
            state,
            received_at: Utc::now(),
        })
    }

    #[test]
    fn status_event_registers_gateway_and_queues() {
        let hub = Hub::new(HubConfig::default());
        hub.deliver(status("gw", GatewayState::Online));

        let gateway = hub.registry().gateway(&DeviceId::from("gw")).unwrap();
        assert_eq!(gateway.state, GatewayState::Online);
        assert_eq!(hub.drain_events().len(), 1);
    }

    #[test]
    fn config_response_registers_sinks() {
        let hub = Hub::new(HubConfig::default());
        let key = CorrelationKey::gateway("gw".into(), RequestKind::GetConfig);
        let configs = vec![
            SinkConfig {
                sink_id: "sink0".into(),
                network_address: Some(100),
                ..SinkConfig::default()
            },
            SinkConfig {
                sink_id: "sink1".into(),
                network_address: Some(200),
                ..SinkConfig::default()
            },
        ];
        hub.deliver(Inbound::Response(Response::new(
            key,
            ResultCode::Ok,
            ResponseBody::Configs { configs },
        )));

        assert_eq!(hub.registry().list_sinks().len(), 2);
        assert_eq!(hub.registry().list_networks().len(), 2);
        assert_eq!(
            hub.registry().gateway(&"gw".into()).unwrap().state,
            GatewayState::Unknown
        );
        assert_eq!(hub.drain_responses().len(), 1);
    }

    #[test]
    fn data_touches_without_overwriting_state() {
        let hub = Hub::new(HubConfig::default());
        hub.deliver(status("gw", GatewayState::Offline));
        hub.deliver(Inbound::Data(DataPacket {
            gateway_id: "gw".into(),
            sink_id: "sink0".into(),
            network_id: 1,
            source_address: 10,
            destination_address: 20,
            source_endpoint: 1,
            destination_endpoint: 2,
            payload: vec![1, 2, 3],
            qos: 0,
            travel_time_ms: 5,
            hop_count: 1,
            received_at: Utc::now(),
        }));

        assert_eq!(
            hub.registry().gateway(&"gw".into()).unwrap().state,
            GatewayState::Offline
        );
        assert_eq!(hub.drain_data().len(), 1);

        let nodes = hub.registry().list_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!((nodes[0].network_id, nodes[0].address), (1, 10));
    }

    #[tokio::test]
    async fn publish_feeds_next_outbound() {
        let hub = Hub::new(HubConfig::default());
        hub.publish(Outbound::ClearStatus {
            gateway_id: "gw".into(),
        });
        let outbound = hub.next_outbound().await;
        assert!(outbound.retain());
    }

    #[tokio::test(start_paused = true)]
    async fn execute_uses_configured_timeout() {
        let hub = Hub::new(HubConfig::default().with_response_timeout(Duration::from_secs(3)));
        let outcome = hub
            .execute(Request::OtapProcess {
                target: SinkTarget::new("gw", "sink0"),
            })
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut(Duration::from_secs(3)));
    }
}
