//! Data plane: sending to a sink and following uplink packets.

use std::io::Write;
use std::time::Duration;

use tokio::io::AsyncRead;

use meshgate_core::{DataPacket, DeviceId, GatewayEvent, Request, SendDataRequest};

use crate::error::CliError;
use crate::shell::{KeyValueArgs, Shell, Tick, TrackingLoop, render};

fn send_data_from_args(args: &KeyValueArgs) -> Result<SendDataRequest, CliError> {
    Ok(SendDataRequest {
        source_endpoint: args.required("source_endpoint")?,
        destination_endpoint: args.required("destination_endpoint")?,
        destination_address: args.required("destination_address")?,
        payload: args
            .bytes("payload")
            .ok_or_else(|| CliError::validation("payload", "is required"))?,
        qos: args.get_or("qos", 1)?,
        is_unack_csma_ca: args.flag("is_unack_csma_ca", false)?,
        hop_limit: args.get_or("hop_limit", 0)?,
        initial_delay_ms: args.get_or("initial_delay_ms", 0)?,
    })
}

/// `timeout=0` or no timeout falls back to the configured response timeout.
fn response_timeout(args: &KeyValueArgs) -> Result<Option<Duration>, CliError> {
    Ok(args
        .get::<u64>("timeout")?
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs))
}

/// Criteria for `track_data_packets`; an unset field matches anything.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PacketFilter {
    gateway_id: Option<DeviceId>,
    sink_id: Option<DeviceId>,
    network_id: Option<u32>,
    source_address: Option<u32>,
    source_endpoint: Option<u8>,
    destination_endpoint: Option<u8>,
}

impl PacketFilter {
    fn from_args(args: &KeyValueArgs) -> Result<Self, CliError> {
        Ok(Self {
            gateway_id: args.str("gw_id").map(DeviceId::new),
            sink_id: args.str("sink_id").map(DeviceId::new),
            network_id: args.get("network_id")?,
            source_address: args.get("source_address")?,
            source_endpoint: args.get("source_endpoint")?,
            destination_endpoint: args.get("destination_endpoint")?,
        })
    }

    fn matches(&self, p: &DataPacket) -> bool {
        self.gateway_id.as_ref().is_none_or(|id| *id == p.gateway_id)
            && self.sink_id.as_ref().is_none_or(|id| *id == p.sink_id)
            && self.network_id.is_none_or(|n| n == p.network_id)
            && self.source_address.is_none_or(|a| a == p.source_address)
            && self.source_endpoint.is_none_or(|e| e == p.source_endpoint)
            && self
                .destination_endpoint
                .is_none_or(|e| e == p.destination_endpoint)
    }

    /// Events carry no sink or endpoint, so only the gateway applies.
    fn matches_event(&self, e: &GatewayEvent) -> bool {
        self.gateway_id.as_ref().is_none_or(|id| *id == e.gateway_id)
    }
}

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub(crate) async fn send_data(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        let data = send_data_from_args(args)?;
        data.validate()?;
        let timeout = response_timeout(args)?;

        let target = self.ensure_target().await?;
        self.run_request(Request::SendData { target, data }, timeout)
            .await?;
        Ok(())
    }

    /// Print matching uplink packets as they arrive. An empty line stops
    /// tracking; any other input is ignored.
    pub(crate) async fn track_data_packets(
        &mut self,
        args: &KeyValueArgs,
    ) -> Result<(), CliError> {
        let filter = PacketFilter::from_args(args)?;
        let mut tracking = TrackingLoop::new(args.iterations("iterations")?);
        let period = self.poll_period(args)?;
        let show_events = args.flag("show_events", false)?;
        let silent = args.flag("silent", false)?;

        self.console
            .write_line("Tracking data packets, press Enter to stop")?;
        loop {
            let format = self.output();
            let painter = self.painter();
            let mut printed = 0_usize;

            for packet in self.hub.drain_data().iter().filter(|p| filter.matches(p)) {
                self.console.write_line(render::packet(packet, format))?;
                printed += 1;
            }
            if show_events {
                for event in self
                    .hub
                    .drain_events()
                    .iter()
                    .filter(|e| filter.matches_event(e))
                {
                    self.console.write_line(render::event(event, format, painter))?;
                    printed += 1;
                }
            }
            if printed == 0 && !silent {
                let line =
                    painter.dim(format!("iteration {}: no packets", tracking.iteration() + 1));
                self.console.write_line(line)?;
            }

            if !tracking.advance() {
                break;
            }
            match self.next_tick(period).await? {
                Tick::Interrupted => break,
                Tick::Input(Some(line)) if line.trim().is_empty() => break,
                Tick::Input(None) if tracking.is_unbounded() => break,
                Tick::Elapsed | Tick::Input(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::commands::ShellCommand;

    fn packet(gateway: &str, sink: &str, source_endpoint: u8) -> DataPacket {
        DataPacket {
            gateway_id: gateway.into(),
            sink_id: sink.into(),
            network_id: 100,
            source_address: 12,
            destination_address: 1,
            source_endpoint,
            destination_endpoint: 11,
            payload: vec![1],
            qos: 1,
            travel_time_ms: 10,
            hop_count: 1,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn send_data_defaults() {
        let args = KeyValueArgs::parse(
            "source_endpoint=1 destination_endpoint=2 destination_address=4294967295 payload=0102",
            ShellCommand::SendData.keys(),
        )
        .unwrap();
        let data = send_data_from_args(&args).unwrap();
        assert_eq!(data.payload, vec![1, 2]);
        assert_eq!(data.destination_address, u32::MAX);
        assert_eq!(data.qos, 1);
        assert!(!data.is_unack_csma_ca);
        assert_eq!(data.hop_limit, 0);
        assert_eq!(data.initial_delay_ms, 0);
        assert_eq!(response_timeout(&args).unwrap(), None);
    }

    #[test]
    fn send_data_requires_payload() {
        let args = KeyValueArgs::parse(
            "source_endpoint=1 destination_endpoint=2 destination_address=3",
            ShellCommand::SendData.keys(),
        )
        .unwrap();
        assert!(send_data_from_args(&args).is_err());
    }

    #[test]
    fn zero_timeout_uses_the_default() {
        let keys = ShellCommand::SendData.keys();
        let zero = KeyValueArgs::parse("timeout=0", keys).unwrap();
        assert_eq!(response_timeout(&zero).unwrap(), None);
        let two = KeyValueArgs::parse("timeout=2", keys).unwrap();
        assert_eq!(response_timeout(&two).unwrap(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn filter_matches_only_given_fields() {
        let args = KeyValueArgs::parse(
            "gw_id=gw1 source_endpoint=10",
            ShellCommand::TrackDataPackets.keys(),
        )
        .unwrap();
        let filter = PacketFilter::from_args(&args).unwrap();
        assert!(filter.matches(&packet("gw1", "sink0", 10)));
        assert!(filter.matches(&packet("gw1", "sink1", 10)));
        assert!(!filter.matches(&packet("gw2", "sink0", 10)));
        assert!(!filter.matches(&packet("gw1", "sink0", 11)));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = PacketFilter::default();
        assert!(filter.matches(&packet("any", "thing", 0)));
    }
}
