use std::io::{self, Write};
use std::time::Duration;

use tokio::io::AsyncRead;

use super::{KeyValueArgs, Shell};
use crate::error::CliError;

/// What woke a waiting shell.
pub(crate) enum Tick {
    /// The poll period elapsed without input.
    Elapsed,
    /// A line arrived, or `None` at end of input.
    Input(Option<String>),
    /// Ctrl-C.
    Interrupted,
}

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    /// Wait for a line or Ctrl-C.
    pub(crate) async fn next_input(&mut self) -> io::Result<Tick> {
        tokio::select! {
            biased;
            Ok(()) = tokio::signal::ctrl_c() => Ok(Tick::Interrupted),
            line = self.console.read_line() => Ok(Tick::Input(line?)),
        }
    }

    /// Wait for a line, Ctrl-C or `period`, whichever comes first. Once
    /// input has ended only the timer and Ctrl-C can wake the shell.
    pub(crate) async fn next_tick(&mut self, period: Duration) -> io::Result<Tick> {
        let input_open = !self.console.is_closed();
        tokio::select! {
            biased;
            Ok(()) = tokio::signal::ctrl_c() => Ok(Tick::Interrupted),
            line = self.console.read_line(), if input_open => Ok(Tick::Input(line?)),
            () = tokio::time::sleep(period) => Ok(Tick::Elapsed),
        }
    }

    /// `update_rate=N` seconds, defaulting to the hub's configured rate.
    pub(crate) fn poll_period(&self, args: &KeyValueArgs) -> Result<Duration, CliError> {
        match args.get::<u64>("update_rate")? {
            None => Ok(self.hub.config().update_rate),
            Some(0) => Err(CliError::validation("update_rate", "must be at least 1 second")),
            Some(secs) => Ok(Duration::from_secs(secs)),
        }
    }
}

/// Iteration bookkeeping shared by the tracking commands.
#[derive(Debug)]
pub(crate) struct TrackingLoop {
    limit: Option<u64>,
    done: u64,
}

impl TrackingLoop {
    /// `None` runs until interrupted.
    pub(crate) fn new(limit: Option<u64>) -> Self {
        Self { limit, done: 0 }
    }

    /// Count one iteration; `false` once the limit is reached.
    pub(crate) fn advance(&mut self) -> bool {
        self.done += 1;
        self.limit.is_none_or(|limit| self.done < limit)
    }

    pub(crate) fn iteration(&self) -> u64 {
        self.done
    }

    pub(crate) fn is_unbounded(&self) -> bool {
        self.limit.is_none()
    }
}
