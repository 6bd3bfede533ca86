//! Interactive command interpreter.
//!
//! One command per device operation. A command resolves its target from the
//! [`Selection`] (prompting when it is unset), builds a typed request, waits
//! on the hub for the correlated response and prints the outcome. A failing
//! command prints its error and the prompt comes back; only end of input or
//! `quit` leaves the loop.

mod args;
mod console;
pub(crate) mod render;
mod selection;
mod tracking;

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncRead;
use tracing::debug;

use meshgate_core::{CorrelationKey, Hub, Outcome, Request};

use crate::cli::OutputFormat;
use crate::commands::ShellCommand;
use crate::error::CliError;
use crate::output::Painter;

pub use args::KeyValueArgs;
pub use console::Console;
pub use selection::Selection;

pub(crate) use tracking::{Tick, TrackingLoop};

/// Presentation settings for a shell session.
#[derive(Debug, Clone, Copy)]
pub struct ShellOptions {
    pub output: OutputFormat,
    pub color: bool,
    /// Show a spinner on stderr while waiting for a response.
    pub spinner: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            output: OutputFormat::Table,
            color: false,
            spinner: io::stderr().is_terminal(),
        }
    }
}

/// Which kinds of unclaimed messages are printed before each command.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PrintToggles {
    pub responses: bool,
    pub events: bool,
    pub data: bool,
}

pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Result of an index prompt.
pub(crate) enum Pick {
    Index(usize),
    Custom(String),
}

pub struct Shell<R, W> {
    pub(crate) hub: Hub,
    pub(crate) console: Console<R, W>,
    pub(crate) selection: Selection,
    pub(crate) options: ShellOptions,
    pub(crate) toggles: PrintToggles,
}

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub fn new(hub: Hub, console: Console<R, W>, options: ShellOptions) -> Self {
        Self {
            hub,
            console,
            selection: Selection::default(),
            options,
            toggles: PrintToggles::default(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn into_output(self) -> W {
        self.console.into_output()
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Read and execute commands until `quit`, end of input or Ctrl-C.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.discard_pending()?;
            let prompt = self.prompt();
            self.console.write_prompt(prompt)?;

            let line = match self.next_input().await? {
                Tick::Input(Some(line)) => line,
                Tick::Input(None) | Tick::Interrupted | Tick::Elapsed => {
                    self.console.write_line("")?;
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.execute_line(line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(CliError::Io(err)) => return Err(err),
                Err(err) => self.report(err)?,
            }
        }
        debug!("shell finished");
        Ok(())
    }

    /// Parse and run a single command line.
    pub(crate) async fn execute_line(&mut self, line: &str) -> Result<Flow, CliError> {
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, rest)| (name, rest.trim()));
        let command: ShellCommand = name.parse().map_err(|_| CliError::UnknownCommand {
            name: name.to_owned(),
        })?;
        debug!(%command, "running shell command");

        if command == ShellCommand::Help {
            self.help(rest)?;
            return Ok(Flow::Continue);
        }
        if command == ShellCommand::Quit {
            return Ok(Flow::Quit);
        }

        let args = KeyValueArgs::parse(rest, command.keys())?;
        match command {
            ShellCommand::List => self.list()?,
            ShellCommand::Gateways => self.gateways()?,
            ShellCommand::Sinks => self.sinks()?,
            ShellCommand::Networks => self.networks()?,
            ShellCommand::Nodes => self.nodes()?,
            ShellCommand::Selection => self.show_selection()?,
            ShellCommand::SetGateway => self.set_gateway(&args).await?,
            ShellCommand::SetSink => self.set_sink(&args).await?,
            ShellCommand::ClearOfflineGateways => self.clear_offline_gateways()?,
            ShellCommand::GatewayConfiguration => self.gateway_configuration().await?,
            ShellCommand::SetConfig => self.set_config(&args).await?,
            ShellCommand::SetAppConfig => self.set_app_config(&args).await?,
            ShellCommand::SendData => self.send_data(&args).await?,
            ShellCommand::ScratchpadStatus => self.scratchpad_status().await?,
            ShellCommand::ScratchpadUpdate => self.scratchpad_update().await?,
            ShellCommand::ScratchpadUpload => self.scratchpad_upload(&args).await?,
            ShellCommand::TrackDevices => self.track_devices(&args).await?,
            ShellCommand::TrackDataPackets => self.track_data_packets(&args).await?,
            ShellCommand::TogglePrintPendingResponses => {
                self.toggles.responses = !self.toggles.responses;
                self.console
                    .write_line(format!("print pending responses: {}", self.toggles.responses))?;
            }
            ShellCommand::TogglePrintPendingEvents => {
                self.toggles.events = !self.toggles.events;
                self.console
                    .write_line(format!("print pending events: {}", self.toggles.events))?;
            }
            ShellCommand::TogglePrintPendingData => {
                self.toggles.data = !self.toggles.data;
                self.console
                    .write_line(format!("print pending data: {}", self.toggles.data))?;
            }
            ShellCommand::Help | ShellCommand::Quit => {}
        }
        Ok(Flow::Continue)
    }

    fn help(&mut self, topic: &str) -> Result<(), CliError> {
        if topic.is_empty() {
            self.console.write_line("Commands:")?;
            self.console.write_line(ShellCommand::overview())?;
            return Ok(());
        }
        let command: ShellCommand = topic.parse().map_err(|_| CliError::UnknownCommand {
            name: topic.to_owned(),
        })?;
        self.console.write_line(command.usage())?;
        Ok(())
    }

    fn prompt(&self) -> String {
        format!(
            "{} | {} > ",
            Local::now().format("%H:%M:%S"),
            self.selection.prompt_label()
        )
    }

    fn report(&mut self, err: CliError) -> io::Result<()> {
        debug!(error = %err, "command failed");
        let report = format!("{:?}", miette::Report::new(err));
        self.console.write_line(report.trim_end())
    }

    pub(crate) fn painter(&self) -> Painter {
        Painter::new(self.options.color)
    }

    pub(crate) fn output(&self) -> OutputFormat {
        self.options.output
    }

    // ── Unclaimed messages ───────────────────────────────────────────

    /// Empty the three inbound queues. Whatever nobody waited for is
    /// dropped here, printed only when its toggle is on.
    fn discard_pending(&mut self) -> io::Result<()> {
        let responses = self.hub.drain_responses();
        let events = self.hub.drain_events();
        let data = self.hub.drain_data();
        if responses.is_empty() && events.is_empty() && data.is_empty() {
            return Ok(());
        }
        debug!(
            responses = responses.len(),
            events = events.len(),
            data = data.len(),
            "discarding unclaimed messages"
        );

        let painter = self.painter();
        if self.toggles.responses {
            for response in &responses {
                let line = format!("pending response: {}", render::response_line(response, painter));
                self.console.write_line(line)?;
            }
        }
        if self.toggles.events {
            for event in &events {
                self.console.write_line(render::event_line(event, painter))?;
            }
        }
        if self.toggles.data {
            for packet in &data {
                self.console.write_line(render::packet_line(packet))?;
            }
        }
        Ok(())
    }

    // ── Prompts ──────────────────────────────────────────────────────

    /// Numbered choice: Enter picks 0, the last index asks for a custom id.
    ///
    /// `None` when input ended or the custom id was left empty.
    pub(crate) async fn pick(
        &mut self,
        what: &str,
        labels: &[String],
    ) -> Result<Option<Pick>, CliError> {
        for (index, label) in labels.iter().enumerate() {
            self.console.write_line(format!("{index:>3} : {label}"))?;
        }
        let custom = labels.len();
        self.console.write_line(format!("{custom:>3} : custom {what} id"))?;

        loop {
            self.console
                .write_prompt(format!("Please enter your {what} selection [0]: "))?;
            let Some(answer) = self.console.read_line().await? else {
                self.console.write_line("")?;
                return Ok(None);
            };
            let answer = answer.trim();
            let index = if answer.is_empty() {
                0
            } else if let Ok(index) = answer.parse::<usize>() {
                index
            } else {
                self.console
                    .write_line(format!("'{answer}' is not a number between 0 and {custom}"))?;
                continue;
            };

            if index < custom {
                return Ok(Some(Pick::Index(index)));
            }
            if index > custom {
                self.console
                    .write_line(format!("{index} is out of range (0-{custom})"))?;
                continue;
            }

            self.console
                .write_prompt(format!("Please enter your custom {what} id: "))?;
            let id = self.console.read_line().await?.unwrap_or_default();
            let id = id.trim();
            return Ok((!id.is_empty()).then(|| Pick::Custom(id.to_owned())));
        }
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send `request`, wait for its response and print the outcome.
    pub(crate) async fn run_request(
        &mut self,
        request: Request,
        timeout: Option<Duration>,
    ) -> Result<Outcome, CliError> {
        let key = request.correlation_key();
        let timeout = timeout.unwrap_or(self.hub.config().response_timeout);

        let spinner = self.spinner(&key);
        let outcome = self.hub.execute_with_timeout(request, timeout).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let outcome = outcome?;
        self.print_outcome(&key, &outcome)?;
        Ok(outcome)
    }

    fn spinner(&self, key: &CorrelationKey) -> Option<ProgressBar> {
        if !self.options.spinner {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("waiting for {key}"));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }

    pub(crate) fn print_outcome(
        &mut self,
        key: &CorrelationKey,
        outcome: &Outcome,
    ) -> Result<(), CliError> {
        let painter = self.painter();
        let text = match outcome {
            Outcome::Response(response) => render::response(response, self.output(), painter),
            Outcome::TimedOut(after) => painter.error(format!(
                "✗ {key}: timed out after {}s without a response",
                after.as_secs_f32()
            )),
        };
        self.console.write_line(text)?;
        Ok(())
    }
}
