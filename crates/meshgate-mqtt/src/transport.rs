// ── Broker transport ──
//
// Two background tasks per connection: the rumqttc event loop, which
// decodes publications into the hub and retries with backoff on error,
// and an outbound pump publishing whatever the hub queues. Both stop on
// the shared cancellation token.

use std::time::Duration;

use meshgate_core::Hub;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{decode_inbound, encode_outbound};
use crate::config::{BrokerConfig, ReconnectConfig, TlsMode};
use crate::error::MqttError;
use crate::topics::SUBSCRIPTIONS;

/// Requests buffered between the client handle and the event loop.
const CLIENT_CHANNEL_CAPACITY: usize = 64;

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
    Closed,
}

/// A running broker connection feeding a [`Hub`].
pub struct MqttTransport {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MqttTransport {
    /// Build the client and spawn the event loop and outbound pump.
    ///
    /// Returns as soon as the tasks are spawned; the first connection
    /// attempt happens in the background. Must be called from within a
    /// Tokio runtime.
    pub fn start(config: &BrokerConfig, hub: Hub) -> Result<Self, MqttError> {
        let options = mqtt_options(config)?;
        let (client, eventloop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        info!(broker = %config.display_url(), client_id = %config.client_id, "starting MQTT transport");

        let event_task = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            hub.clone(),
            config.reconnect.clone(),
            state_tx,
            cancel.clone(),
        ));
        let pump_task = tokio::spawn(outbound_pump(client.clone(), hub, cancel.clone()));

        Ok(Self {
            client,
            state,
            cancel,
            tasks: vec![event_task, pump_task],
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the first connection attempt settles, at most `timeout`.
    ///
    /// Returns the state at that point: `Connected` on success, otherwise
    /// whatever the transport is doing about it.
    pub async fn wait_settled(&self, timeout: Duration) -> ConnectionState {
        let mut state = self.state.clone();
        let settled = tokio::time::timeout(
            timeout,
            state.wait_for(|s| !matches!(s, ConnectionState::Connecting)),
        )
        .await;
        match settled {
            Ok(Ok(current)) => current.clone(),
            _ => self.state(),
        }
    }

    /// Disconnect and stop the background tasks.
    pub async fn shutdown(self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "disconnect request not queued");
        }
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "transport task ended abnormally");
            }
        }
        info!("MQTT transport stopped");
    }
}

fn mqtt_options(config: &BrokerConfig) -> Result<MqttOptions, MqttError> {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some(username) = &config.username {
        let password = config
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        options.set_credentials(username, password);
    }

    match &config.tls {
        TlsMode::Plain => {}
        TlsMode::SystemRoots => {
            options.set_transport(Transport::tls_with_default_config());
        }
        TlsMode::CustomCa(path) => {
            let ca = std::fs::read(path).map_err(|e| MqttError::Tls {
                message: format!("cannot read CA bundle {}: {e}", path.display()),
            })?;
            options.set_transport(Transport::tls(ca, None, None));
        }
    }

    Ok(options)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Poll the event loop, deliver publications, back off on errors.
async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    hub: Hub,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to broker");
                attempt = 0;
                state.send_replace(ConnectionState::Connected);
                // The session is clean, so subscriptions are renewed on every connect.
                for filter in SUBSCRIPTIONS {
                    if let Err(e) = client.try_subscribe(filter, QoS::AtLeastOnce) {
                        warn!(filter, error = %e, "subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match decode_inbound(&publish.topic, &publish.payload) {
                    Ok(Some(inbound)) => hub.deliver(inbound),
                    Ok(None) => debug!(topic = %publish.topic, "ignoring publication"),
                    Err(e) => warn!(error = %e, "dropping undecodable message"),
                }
            }
            Ok(event) => {
                trace!(?event, "mqtt event");
            }
            Err(e) => {
                warn!(error = %e, attempt, "MQTT connection error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        error!(max_retries = max, "MQTT reconnection limit reached, giving up");
                        state.send_replace(ConnectionState::Failed);
                        break;
                    }
                }
                state.send_replace(ConnectionState::Reconnecting { attempt });

                let delay = reconnect.backoff(attempt);
                debug!(?delay, attempt, "waiting before reconnect");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                attempt = attempt.saturating_add(1);
            }
        }
    }

    if !matches!(*state.borrow(), ConnectionState::Failed) {
        state.send_replace(ConnectionState::Closed);
    }
    debug!("MQTT event loop exiting");
}

/// Publish everything the hub queues until cancelled.
async fn outbound_pump(client: AsyncClient, hub: Hub, cancel: CancellationToken) {
    loop {
        let outbound = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outbound = hub.next_outbound() => outbound,
        };

        let publication = match encode_outbound(&outbound) {
            Ok(publication) => publication,
            Err(e) => {
                warn!(error = %e, "dropping unencodable outbound message");
                continue;
            }
        };
        debug!(topic = %publication.topic, qos = ?publication.qos, retain = publication.retain, "publishing");
        if let Err(e) = client
            .publish(
                publication.topic,
                publication.qos,
                publication.retain,
                publication.payload,
            )
            .await
        {
            warn!(error = %e, "publish failed");
        }
    }
    debug!("outbound pump exiting");
}
