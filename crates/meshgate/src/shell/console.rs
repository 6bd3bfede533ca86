use std::fmt::Display;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

/// Line-oriented input plus a synchronous output sink.
///
/// Input is async so that tracking loops can race a line against a timer.
pub struct Console<R, W> {
    lines: Lines<BufReader<R>>,
    out: W,
    closed: bool,
}

impl<R, W> Console<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: BufReader::new(input).lines(),
            out,
            closed: false,
        }
    }

    /// Next input line without its terminator; `None` once input has ended.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }
        let line = self.lines.next_line().await?;
        if line.is_none() {
            self.closed = true;
        }
        Ok(line)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn write_line(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Write without a newline (prompts).
    pub fn write_prompt(&mut self, text: impl Display) -> io::Result<()> {
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_end_of_input_once_and_stays_closed() {
        let mut console = Console::new(&b"first\nsecond"[..], Vec::new());
        assert_eq!(console.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(console.read_line().await.unwrap().as_deref(), Some("second"));
        assert!(!console.is_closed());
        assert_eq!(console.read_line().await.unwrap(), None);
        assert!(console.is_closed());
        assert_eq!(console.read_line().await.unwrap(), None);
    }

    #[test]
    fn prompt_has_no_newline() {
        let mut console = Console::new(&b""[..], Vec::new());
        console.write_prompt("> ").unwrap();
        console.write_line("done").unwrap();
        assert_eq!(console.into_output(), b"> done\n");
    }
}
