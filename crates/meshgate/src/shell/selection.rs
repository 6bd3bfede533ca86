use serde::Serialize;

use meshgate_core::{DeviceId, Gateway, Sink, SinkTarget};

/// The shell's current focus. Starts empty, changes only through the
/// `set_*` commands and lives as long as the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub gateway: Option<Gateway>,
    pub sink: Option<Sink>,
    pub network: Option<u32>,
}

impl Selection {
    /// Selecting another gateway drops the sink and network picked under the old one.
    pub fn select_gateway(&mut self, gateway: Gateway) {
        let changed = self
            .gateway
            .as_ref()
            .is_none_or(|current| current.device_id != gateway.device_id);
        if changed {
            self.sink = None;
            self.network = None;
        }
        self.gateway = Some(gateway);
    }

    pub fn select_sink(&mut self, sink: Sink) {
        self.network = sink.network_id;
        self.sink = Some(sink);
    }

    pub fn gateway_id(&self) -> Option<&DeviceId> {
        self.gateway.as_ref().map(|g| &g.device_id)
    }

    pub fn target(&self) -> Option<SinkTarget> {
        let sink = self.sink.as_ref()?;
        Some(SinkTarget::new(sink.gateway_id.clone(), sink.device_id.clone()))
    }

    /// `meshgate`, `meshgate:GW` or `meshgate:GW:SINK`.
    pub fn prompt_label(&self) -> String {
        let mut label = String::from("meshgate");
        if let Some(gateway) = &self.gateway {
            label.push(':');
            label.push_str(gateway.device_id.as_str());
            if let Some(sink) = &self.sink {
                label.push(':');
                label.push_str(sink.device_id.as_str());
            }
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use meshgate_core::GatewayState;

    use super::*;

    fn gateway(id: &str) -> Gateway {
        Gateway::new(id.into(), GatewayState::Online)
    }

    #[test]
    fn prompt_follows_selection() {
        let mut selection = Selection::default();
        assert_eq!(selection.prompt_label(), "meshgate");

        selection.select_gateway(gateway("gw1"));
        selection.select_sink(Sink::new("sink0".into(), "gw1".into(), Some(7)));
        assert_eq!(selection.prompt_label(), "meshgate:gw1:sink0");
        assert_eq!(selection.network, Some(7));
        assert_eq!(
            selection.target(),
            Some(SinkTarget::new("gw1", "sink0"))
        );
    }

    #[test]
    fn switching_gateway_clears_sink() {
        let mut selection = Selection::default();
        selection.select_gateway(gateway("gw1"));
        selection.select_sink(Sink::new("sink0".into(), "gw1".into(), Some(7)));

        selection.select_gateway(gateway("gw1"));
        assert!(selection.sink.is_some());

        selection.select_gateway(gateway("gw2"));
        assert_eq!(selection.sink, None);
        assert_eq!(selection.network, None);
        assert_eq!(selection.target(), None);
    }
}
