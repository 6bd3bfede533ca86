//! Sink configuration commands.

use std::io::Write;

use tokio::io::AsyncRead;

use meshgate_core::{AppConfig, DeviceId, Outcome, Request, SetConfigRequest};

use crate::error::CliError;
use crate::shell::{KeyValueArgs, Shell};

const DEFAULT_DIAGNOSTIC_INTERVAL_SECS: u16 = 60;

fn config_from_args(args: &KeyValueArgs) -> Result<SetConfigRequest, CliError> {
    Ok(SetConfigRequest {
        node_role: args.get("node_role")?,
        node_address: args.get("node_address")?,
        network_address: args.get("network_address")?,
        network_channel: args.get("network_channel")?,
        started: args.optional_flag("started")?,
        app_config: None,
    })
}

fn app_config_from_args(args: &KeyValueArgs) -> Result<AppConfig, CliError> {
    Ok(AppConfig {
        sequence: args.required("app_config_seq")?,
        data: args
            .bytes("app_config_data")
            .ok_or_else(|| CliError::validation("app_config_data", "is required"))?,
        diagnostic_interval_secs: args
            .get_or("app_config_diag", DEFAULT_DIAGNOSTIC_INTERVAL_SECS)?,
    })
}

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    /// Ask one gateway for the configuration of all its sinks. The hub
    /// folds the answer into the registry.
    pub(crate) async fn request_configuration(
        &mut self,
        gateway_id: &DeviceId,
    ) -> Result<Outcome, CliError> {
        let request = Request::GetConfig {
            gateway_id: gateway_id.clone(),
        };
        self.run_request(request, None).await
    }

    /// `get_configs` for the selected gateway, or for every gateway that
    /// is not known to be offline.
    pub(crate) async fn gateway_configuration(&mut self) -> Result<(), CliError> {
        let targets: Vec<DeviceId> = match self.selection.gateway_id() {
            Some(id) => vec![id.clone()],
            None => self
                .hub
                .registry()
                .list_gateways()
                .into_iter()
                .filter(|g| !g.state.is_offline())
                .map(|g| g.device_id)
                .collect(),
        };
        if targets.is_empty() {
            self.console
                .write_line("No gateways known yet, wait for a status event or use set_gateway")?;
            return Ok(());
        }

        for gateway_id in targets {
            self.console
                .write_line(format!("Requesting configuration for {gateway_id}"))?;
            self.request_configuration(&gateway_id).await?;
        }
        Ok(())
    }

    pub(crate) async fn set_config(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        let config = config_from_args(args)?;
        config.validate()?;

        let target = self.ensure_target().await?;
        self.run_request(Request::SetConfig { target, config }, None)
            .await?;
        Ok(())
    }

    pub(crate) async fn set_app_config(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        let config = SetConfigRequest {
            app_config: Some(app_config_from_args(args)?),
            ..SetConfigRequest::default()
        };
        config.validate()?;

        let target = self.ensure_target().await?;
        self.run_request(Request::SetConfig { target, config }, None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::commands::ShellCommand;

    fn parse(command: ShellCommand, line: &str) -> KeyValueArgs {
        KeyValueArgs::parse(line, command.keys()).unwrap()
    }

    #[test]
    fn only_given_fields_are_set() {
        let args = parse(ShellCommand::SetConfig, "node_address=1003 started=no");
        let config = config_from_args(&args).unwrap();
        assert_eq!(
            config,
            SetConfigRequest {
                node_address: Some(1003),
                started: Some(false),
                ..SetConfigRequest::default()
            }
        );
    }

    #[test]
    fn empty_set_config_is_rejected() {
        let args = parse(ShellCommand::SetConfig, "");
        let config = config_from_args(&args).unwrap();
        let err = CliError::from(config.validate().unwrap_err());
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn app_config_defaults_diagnostic_interval() {
        let args = parse(ShellCommand::SetAppConfig, "app_config_seq=3 app_config_data=0a0b");
        let app = app_config_from_args(&args).unwrap();
        assert_eq!(app.sequence, 3);
        assert_eq!(app.data, vec![0x0a, 0x0b]);
        assert_eq!(app.diagnostic_interval_secs, 60);
    }

    #[test]
    fn app_config_data_is_required() {
        let args = parse(ShellCommand::SetAppConfig, "app_config_seq=3");
        assert!(matches!(
            app_config_from_args(&args),
            Err(CliError::Validation { ref field, .. }) if field == "app_config_data"
        ));
    }
}
