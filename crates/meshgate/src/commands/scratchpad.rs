//! Over-the-air scratchpad commands.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;
use tracing::debug;

use meshgate_core::{OtapLoadRequest, Request};

use crate::error::CliError;
use crate::shell::{KeyValueArgs, Shell};

/// Read a scratchpad image. Failures are reported as a bad `file_path` so
/// the shell keeps running.
async fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| CliError::validation("file_path", format!("{}: {e}", path.display())))
}

impl<R, W> Shell<R, W>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    pub(crate) async fn scratchpad_status(&mut self) -> Result<(), CliError> {
        let target = self.ensure_target().await?;
        self.run_request(Request::OtapStatus { target }, None).await?;
        Ok(())
    }

    /// Tell the sink to process its stored scratchpad.
    pub(crate) async fn scratchpad_update(&mut self) -> Result<(), CliError> {
        let target = self.ensure_target().await?;
        self.run_request(Request::OtapProcess { target }, None)
            .await?;
        Ok(())
    }

    pub(crate) async fn scratchpad_upload(&mut self, args: &KeyValueArgs) -> Result<(), CliError> {
        let path: PathBuf = args.required("file_path")?;
        let sequence: u8 = args.required("seq")?;
        let load = OtapLoadRequest {
            sequence,
            scratchpad: read_image(&path).await?,
        };
        load.validate()?;
        debug!(path = %path.display(), bytes = load.scratchpad.len(), "scratchpad image loaded");

        let target = self.ensure_target().await?;
        self.console.write_line(format!(
            "Uploading {} bytes from {} as sequence {sequence}",
            load.scratchpad.len(),
            path.display()
        ))?;
        self.run_request(Request::OtapLoad { target, load }, None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_image_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_image(&dir.path().join("absent.otap")).await.unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "file_path"));
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }

    #[tokio::test]
    async fn image_bytes_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.otap");
        std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).unwrap();
        assert_eq!(read_image(&path).await.unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }
}
