use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use meshgate::cli::{Cli, Command, GlobalOpts};
use meshgate::commands::config_cmd;
use meshgate::config;
use meshgate::error::CliError;
use meshgate::output;
use meshgate::shell::{Console, Shell, ShellOptions};
use meshgate_core::{Hub, HubConfig};
use meshgate_mqtt::{ConnectionState, MqttTransport};

/// How long to wait for the first broker connection before starting the shell.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a broker connection
        Some(Command::Config(args)) => config_cmd::handle(args, &cli.global),

        Some(Command::Completions(args)) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "meshgate", &mut io::stdout());
            Ok(())
        }

        Some(Command::Shell) | None => run_shell(&cli.global).await,
    }
}

async fn run_shell(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let settings = config::resolve(global, &cfg)?;
    debug!(profile = %settings.profile_name, broker = %settings.broker.display_url(), "resolved settings");

    let hub = Hub::new(
        HubConfig::default()
            .with_response_timeout(settings.response_timeout)
            .with_update_rate(settings.update_rate),
    );
    let transport = MqttTransport::start(&settings.broker, hub.clone())?;

    let state = transport.wait_settled(CONNECT_GRACE).await;
    match state {
        ConnectionState::Connected => {
            if !global.quiet {
                eprintln!(
                    "Connected to {}. Type `help` for commands.",
                    settings.broker.display_url()
                );
            }
        }
        ConnectionState::Failed => {
            transport.shutdown().await;
            return Err(CliError::ConnectionFailed {
                url: settings.broker.display_url(),
            });
        }
        state => warn!(?state, "broker not connected yet, requests will wait for it"),
    }

    let options = ShellOptions {
        output: settings.output,
        color: output::should_color(settings.color),
        spinner: io::stderr().is_terminal() && !global.quiet,
    };
    let console = Console::new(tokio::io::stdin(), io::stdout());
    let mut shell = Shell::new(hub, console, options);
    let result = shell.run().await;

    transport.shutdown().await;
    result?;
    Ok(())
}
